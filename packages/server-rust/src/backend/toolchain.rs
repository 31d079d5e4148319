//! Runs a language toolchain as a child process in a per-submission workspace.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use judge_dispatch_core::{CompileStatus, Language, Route, Submission};
use tokio::process::Command;

use super::{CompileBackend, CompileError};

/// Language-specific compile command and file layout.
pub trait Toolchain: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn language(&self) -> Language;
    /// File name the source is written to inside the workspace.
    fn source_file(&self) -> &'static str;
    /// File name of the artifact the command produces inside the workspace.
    fn artifact_file(&self) -> &'static str;
    /// Full argv, program first.
    fn compile_command(&self, workdir: &Path) -> Vec<String>;
}

/// Settings shared by all toolchain backends.
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    /// Workspaces are created under `<artifact_root>/<route>/<submission id>/`.
    /// The execution stage must be able to read this directory.
    pub artifact_root: PathBuf,
    /// Wall-clock limit for one compiler invocation.
    pub compile_timeout: Duration,
    /// Diagnostics longer than this are truncated.
    pub max_diagnostic_bytes: usize,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            artifact_root: std::env::temp_dir().join("judge-dispatch"),
            compile_timeout: Duration::from_secs(30),
            max_diagnostic_bytes: 64 * 1024,
        }
    }
}

/// [`CompileBackend`] that shells out to a [`Toolchain`].
pub struct ToolchainBackend<T: Toolchain> {
    toolchain: T,
    config: ToolchainConfig,
}

impl<T: Toolchain> ToolchainBackend<T> {
    #[must_use]
    pub fn new(toolchain: T, config: ToolchainConfig) -> Self {
        Self { toolchain, config }
    }

    /// Workspace directory for a submission. Ids must be a single plain path
    /// segment.
    fn workdir(&self, submission_id: &str, route: Route) -> Result<PathBuf, CompileError> {
        if !is_plain_segment(submission_id) {
            return Err(CompileError::InvalidSubmissionId {
                id: submission_id.to_string(),
            });
        }
        Ok(self
            .config
            .artifact_root
            .join(route.as_str())
            .join(submission_id))
    }
}

#[async_trait]
impl<T: Toolchain> CompileBackend for ToolchainBackend<T> {
    fn name(&self) -> &'static str {
        self.toolchain.name()
    }

    async fn compile(&self, submission: &Submission, route: Route) -> Result<Submission, CompileError> {
        let expected = self.toolchain.language();
        if submission.supported_language() != Some(expected) {
            return Err(CompileError::LanguageMismatch {
                backend: self.toolchain.name(),
                expected,
                found: submission.language.clone(),
            });
        }
        let Some(source) = submission.source_code() else {
            return Err(CompileError::MissingSource {
                id: submission.id.clone(),
            });
        };

        let workdir = self.workdir(&submission.id, route)?;
        tokio::fs::create_dir_all(&workdir).await?;

        // An artifact left by an earlier compile of the same id must not be reported.
        let artifact = workdir.join(self.toolchain.artifact_file());
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::write(workdir.join(self.toolchain.source_file()), source).await?;

        let argv = self.toolchain.compile_command(&workdir);
        let Some((program, args)) = argv.split_first() else {
            return Err(CompileError::Spawn {
                program: self.toolchain.name().to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty compile command"),
            });
        };

        let child = Command::new(program)
            .args(args)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompileError::Spawn {
                program: program.clone(),
                source,
            })?;

        // On timeout the child is dropped with the future and killed.
        let output = match tokio::time::timeout(self.config.compile_timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(CompileError::Timeout {
                    timeout_ms: u64::try_from(self.config.compile_timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        if output.status.success() {
            if !tokio::fs::try_exists(&artifact).await? {
                return Err(CompileError::MissingArtifact {
                    path: artifact.to_string_lossy().to_string(),
                });
            }
            tracing::debug!(
                submission_id = %submission.id,
                toolchain = self.toolchain.name(),
                "compiled"
            );
            return Ok(submission
                .clone()
                .with_artifact(artifact.to_string_lossy().to_string()));
        }

        let diagnostic = diagnostic_text(&output, self.config.max_diagnostic_bytes);
        tracing::debug!(
            submission_id = %submission.id,
            toolchain = self.toolchain.name(),
            status = %output.status,
            "source rejected by toolchain"
        );
        Ok(submission
            .clone()
            .with_compile_failure(CompileStatus::CompilationFailed, diagnostic))
    }
}

fn is_plain_segment(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Compiler diagnostic from stderr, falling back to stdout, then to the exit status.
fn diagnostic_text(output: &std::process::Output, max_bytes: usize) -> String {
    let stream = if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    };
    let text = String::from_utf8_lossy(stream).trim_end().to_string();
    if text.is_empty() {
        return format!("toolchain exited with {}", output.status);
    }
    truncate_utf8(text, max_bytes)
}

fn truncate_utf8(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n[diagnostic truncated]");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toolchain that runs a shell script in the workspace.
    struct ShellToolchain {
        program: &'static str,
        script: &'static str,
    }

    impl ShellToolchain {
        fn new(script: &'static str) -> Self {
            Self {
                program: "sh",
                script,
            }
        }
    }

    impl Toolchain for ShellToolchain {
        fn name(&self) -> &'static str {
            "sh"
        }
        fn language(&self) -> Language {
            Language::Cpp
        }
        fn source_file(&self) -> &'static str {
            "solution.src"
        }
        fn artifact_file(&self) -> &'static str {
            "solution.out"
        }
        fn compile_command(&self, _workdir: &Path) -> Vec<String> {
            vec![
                self.program.to_string(),
                "-c".to_string(),
                self.script.to_string(),
            ]
        }
    }

    fn backend(dir: &tempfile::TempDir, toolchain: ShellToolchain, timeout: Duration) -> ToolchainBackend<ShellToolchain> {
        ToolchainBackend::new(
            toolchain,
            ToolchainConfig {
                artifact_root: dir.path().to_path_buf(),
                compile_timeout: timeout,
                max_diagnostic_bytes: 1024,
            },
        )
    }

    #[tokio::test]
    async fn successful_compile_records_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("cp solution.src solution.out"), Duration::from_secs(10));
        let input = Submission::new("s1", "cpp", "int main() { return 0; }");

        let output = backend.compile(&input, Route::Practice).await.unwrap();

        let expected = dir.path().join("practice").join("s1").join("solution.out");
        assert_eq!(output.compile_status(), Some(CompileStatus::Compiled));
        assert_eq!(output.compiled_artifact(), Some(expected.to_string_lossy().as_ref()));
        assert!(output.compile_error().is_none());
        assert_eq!(
            std::fs::read_to_string(&expected).unwrap(),
            "int main() { return 0; }"
        );
        // The input entity is left untouched.
        assert!(input.compile_status().is_none());
        assert!(input.compiled_artifact().is_none());
    }

    #[tokio::test]
    async fn rejected_source_is_a_normal_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(
            &dir,
            ShellToolchain::new("echo \"solution.cpp:1:1: error: expected ';'\" >&2; exit 1"),
            Duration::from_secs(10),
        );
        let input = Submission::new("s2", "cpp", "int main( {");

        let output = backend.compile(&input, Route::Graded).await.unwrap();

        assert_eq!(output.compile_status(), Some(CompileStatus::CompilationFailed));
        assert!(output.compile_error().unwrap().contains("expected ';'"));
        assert!(output.compiled_artifact().is_none());
    }

    #[tokio::test]
    async fn silent_failure_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("exit 3"), Duration::from_secs(10));
        let output = backend
            .compile(&Submission::new("s3", "cpp", ""), Route::Graded)
            .await
            .unwrap();
        assert!(output.compile_error().unwrap().starts_with("toolchain exited with"));
    }

    #[tokio::test]
    async fn slow_toolchain_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("sleep 5"), Duration::from_millis(100));
        let err = backend
            .compile(&Submission::new("s4", "cpp", ""), Route::Graded)
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::Timeout { timeout_ms: 100 }));
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("true"), Duration::from_secs(10));
        for id in ["../escape", "a/b", "", "."] {
            let err = backend
                .compile(&Submission::new(id, "cpp", ""), Route::Graded)
                .await
                .unwrap_err();
            assert!(matches!(err, CompileError::InvalidSubmissionId { .. }), "id {id:?}");
        }
    }

    #[tokio::test]
    async fn missing_compiler_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = ShellToolchain {
            program: "/nonexistent/bin/compiler",
            script: "true",
        };
        let backend = backend(&dir, toolchain, Duration::from_secs(10));
        let err = backend
            .compile(&Submission::new("s5", "cpp", ""), Route::Graded)
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[tokio::test]
    async fn success_without_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("true"), Duration::from_secs(10));
        let err = backend
            .compile(&Submission::new("s6", "cpp", ""), Route::Graded)
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingArtifact { .. }));
    }

    #[tokio::test]
    async fn stale_artifact_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let ok = backend(&dir, ShellToolchain::new("cp solution.src solution.out"), Duration::from_secs(10));
        ok.compile(&Submission::new("s7", "cpp", "v1"), Route::Graded)
            .await
            .unwrap();

        let noop = backend(&dir, ShellToolchain::new("true"), Duration::from_secs(10));
        let err = noop
            .compile(&Submission::new("s7", "cpp", "v2"), Route::Graded)
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingArtifact { .. }));
    }

    #[tokio::test]
    async fn other_language_is_refused_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("cp solution.src solution.out"), Duration::from_secs(10));
        let err = backend
            .compile(&Submission::new("s8", "java", "class Main {}"), Route::Graded)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CompileError::LanguageMismatch { expected: Language::Cpp, ref found, .. } if found == "java"
        ));
        assert!(!dir.path().join("graded").join("s8").exists());
    }

    #[tokio::test]
    async fn record_without_source_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir, ShellToolchain::new("cp solution.src solution.out"), Duration::from_secs(10));
        let submission: Submission =
            serde_json::from_value(serde_json::json!({ "_id": "s9", "language": "cpp" })).unwrap();

        let err = backend.compile(&submission, Route::Graded).await.unwrap_err();
        assert!(matches!(err, CompileError::MissingSource { ref id } if id == "s9"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "ééééé".to_string(); // 10 bytes
        let truncated = truncate_utf8(text, 3);
        assert!(truncated.starts_with('é'));
        assert!(truncated.ends_with("[diagnostic truncated]"));
        assert_eq!(truncate_utf8("short".to_string(), 64), "short");
    }
}
