//! The persisted submission record, as seen by the dispatch stage.
//!
//! Records are owned by an external store. This stage holds a transient copy,
//! optionally enriches its compilation fields and forwards it downstream, so
//! every field the store carries must survive deserialization untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::language::Language;

const SOURCE_CODE: &str = "source_code";
const COMPILED_ARTIFACT: &str = "compiled_artifact";
const COMPILE_STATUS: &str = "compile_status";
const COMPILE_ERROR: &str = "compile_error";

/// Outcome of a compilation attempt, recorded on the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStatus {
    /// The toolchain produced an artifact.
    Compiled,
    /// The toolchain rejected the source; `compile_error` holds the diagnostic.
    CompilationFailed,
    /// The backend itself failed (spawn error, timeout, I/O).
    BackendError,
}

impl CompileStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compiled => "compiled",
            Self::CompilationFailed => "compilation_failed",
            Self::BackendError => "backend_error",
        }
    }

    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "compiled" => Some(Self::Compiled),
            "compilation_failed" => Some(Self::CompilationFailed),
            "backend_error" => Some(Self::BackendError),
            _ => None,
        }
    }
}

/// A user's code submission together with its compilation outcome.
///
/// Only `_id` and `language` are typed; `language` stays the raw stored
/// string so records in languages outside [`Language::ALL`] can still be
/// loaded and then rejected. Every other field, including the source and
/// the compilation fields, lives in `extra` exactly as stored, so a record
/// this stage does not compile is forwarded unchanged. The `with_*` methods
/// are the only writers of the compilation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: String,
    pub language: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Submission {
    /// Create a bare submission with no compilation outcome.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        language: impl Into<String>,
        source_code: impl Into<String>,
    ) -> Self {
        let mut extra = Map::new();
        extra.insert(SOURCE_CODE.to_string(), Value::String(source_code.into()));
        Self {
            id: id.into(),
            language: language.into(),
            extra,
        }
    }

    /// The parsed language, or `None` if it is outside the supported set.
    #[must_use]
    pub fn supported_language(&self) -> Option<Language> {
        Language::from_wire(&self.language)
    }

    /// Stored source text, if the record carries it as a string.
    #[must_use]
    pub fn source_code(&self) -> Option<&str> {
        self.extra.get(SOURCE_CODE).and_then(Value::as_str)
    }

    #[must_use]
    pub fn compiled_artifact(&self) -> Option<&str> {
        self.extra.get(COMPILED_ARTIFACT).and_then(Value::as_str)
    }

    /// Compilation status, if it is one this stage writes. Other stored
    /// values are left in `extra` untouched.
    #[must_use]
    pub fn compile_status(&self) -> Option<CompileStatus> {
        self.extra
            .get(COMPILE_STATUS)
            .and_then(Value::as_str)
            .and_then(CompileStatus::from_wire)
    }

    #[must_use]
    pub fn compile_error(&self) -> Option<&str> {
        self.extra.get(COMPILE_ERROR).and_then(Value::as_str)
    }

    /// Record a successful compilation.
    #[must_use]
    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.set_status(CompileStatus::Compiled);
        self.extra
            .insert(COMPILED_ARTIFACT.to_string(), Value::String(artifact.into()));
        self.extra.remove(COMPILE_ERROR);
        self
    }

    /// Record a failed compilation with its diagnostic.
    #[must_use]
    pub fn with_compile_failure(mut self, status: CompileStatus, diagnostic: impl Into<String>) -> Self {
        self.set_status(status);
        self.extra.remove(COMPILED_ARTIFACT);
        self.extra
            .insert(COMPILE_ERROR.to_string(), Value::String(diagnostic.into()));
        self
    }

    fn set_status(&mut self, status: CompileStatus) {
        self.extra
            .insert(COMPILE_STATUS.to_string(), Value::String(status.as_str().to_string()));
    }
}
