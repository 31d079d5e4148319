//! Pluggable per-language compilation backends.
//!
//! The dispatcher only knows the [`CompileBackend`] contract. Real toolchain
//! invocation lives in [`toolchain`]; per-language commands in [`languages`].

pub mod languages;
pub mod toolchain;

use std::sync::Arc;

use async_trait::async_trait;
use judge_dispatch_core::{Language, Route, Submission};

pub use languages::{CppToolchain, JavaToolchain};
pub use toolchain::{Toolchain, ToolchainBackend, ToolchainConfig};

/// A compilation capability for one language.
///
/// `compile` must not touch the input; it returns a copy of the entity with
/// the compilation fields filled in. Source that fails to compile is a normal
/// outcome (`compile_status = compilation_failed`), not an error.
#[async_trait]
pub trait CompileBackend: Send + Sync {
    /// Short name for logs (e.g. `"g++"`).
    fn name(&self) -> &'static str;

    /// Compile the submission's source.
    async fn compile(&self, submission: &Submission, route: Route) -> Result<Submission, CompileError>;
}

/// Failures of the backend itself, as opposed to the user's code.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("submission id {id:?} cannot be used as a workspace name")]
    InvalidSubmissionId { id: String },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("compilation exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("toolchain reported success but produced no artifact at {path}")]
    MissingArtifact { path: String },
    #[error("submission {id} has no source_code")]
    MissingSource { id: String },
    #[error("{backend} compiles {expected}, submission is {found:?}")]
    LanguageMismatch {
        backend: &'static str,
        expected: Language,
        found: String,
    },
    #[error("workspace I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the toolchain backend for a language, if one exists.
///
/// Interpreted languages have no toolchain and return `None`.
#[must_use]
pub fn toolchain_backend_for(
    language: Language,
    config: &ToolchainConfig,
) -> Option<Arc<dyn CompileBackend>> {
    match language {
        Language::Cpp => Some(Arc::new(ToolchainBackend::new(
            CppToolchain::default(),
            config.clone(),
        ))),
        Language::Java => Some(Arc::new(ToolchainBackend::new(
            JavaToolchain::default(),
            config.clone(),
        ))),
        Language::Python | Language::JavaScript => None,
    }
}
