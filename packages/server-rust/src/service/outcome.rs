//! Per-request outcomes and errors of the dispatch pipeline.

use std::fmt;

use judge_dispatch_core::Route;

/// How a single compile request finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A compile result was published downstream.
    Published {
        submission_id: String,
        route: Route,
        disposition: Disposition,
    },
    /// The request was dropped without publishing.
    Dropped(DropReason),
}

impl DispatchOutcome {
    /// Short label used for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Dropped(_) => "dropped",
        }
    }
}

/// What happened to the entity before it was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No backend registered for the language; forwarded unchanged.
    PassedThrough,
    /// The backend returned an enriched entity.
    Compiled,
    /// The backend failed and the failure was embedded in the entity.
    BackendFailed,
}

/// Why a request was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No record with this id in the selected collection.
    InvalidSubmission { submission_id: String, route: Route },
    /// The stored language is outside the supported set.
    UnsupportedLanguage { submission_id: String, language: String },
    /// Strict request-type checking is on and the type is unknown.
    UnrecognizedType { request_type: String },
    /// The backend failed and the failure policy is to drop.
    CompilationFailed { submission_id: String, error: String },
}

impl DropReason {
    /// Stable label used for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidSubmission { .. } => "invalid_submission",
            Self::UnsupportedLanguage { .. } => "unsupported_language",
            Self::UnrecognizedType { .. } => "unrecognized_type",
            Self::CompilationFailed { .. } => "compilation_failed",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSubmission { route, .. } => write!(f, "invalid {route} submission"),
            Self::UnsupportedLanguage { language, .. } => {
                write!(f, "language {language} not supported")
            }
            Self::UnrecognizedType { request_type } => {
                write!(f, "unrecognized request type {request_type:?}")
            }
            Self::CompilationFailed { error, .. } => write!(f, "compilation failed: {error}"),
        }
    }
}

/// Errors that abort a single request. None of them stop the consume loop.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed compile request: {0}")]
    MalformedRequest(#[source] anyhow::Error),
    #[error("submission store unavailable: {0}")]
    Store(#[source] anyhow::Error),
    #[error("failed to encode compile result: {0}")]
    Encode(#[source] anyhow::Error),
    #[error("failed to publish compile result: {0}")]
    Publish(#[source] anyhow::Error),
}

impl DispatchError {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "malformed_request",
            Self::Store(_) => "store_error",
            Self::Encode(_) => "encode_error",
            Self::Publish(_) => "publish_error",
        }
    }
}
