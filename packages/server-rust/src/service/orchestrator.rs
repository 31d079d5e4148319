//! Dispatch orchestrator: classify -> load -> resolve -> compile -> publish.
//!
//! Owns all per-request error containment. Invalid requests are dropped with a
//! logged reason; collaborator failures surface as `DispatchError` for the
//! caller to log. Nothing here is shared across requests except read-only
//! handles (store, registry, bus) and the optional per-id lock table.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use judge_dispatch_core::{CompileRequest, CompileResult, CompileStatus, RequestKind, Submission};
use tower::Service;

use super::classify::RequestClassifier;
use super::config::{CompileFailurePolicy, DispatcherConfig};
use super::locks::SubmissionLocks;
use super::outcome::{DispatchError, DispatchOutcome, Disposition, DropReason};
use super::publisher::ResultPublisher;
use super::registry::{BackendRegistry, Resolution};
use super::repository::SubmissionRepository;
use crate::backend::CompileError;
use crate::traits::{MessagePublisher, SubmissionStore};

/// Result of the compile step, decided before anything is published.
#[derive(Debug)]
pub enum CompileOutcome {
    /// No backend for the language; the loaded entity is forwarded as is.
    PassedThrough(Submission),
    /// The backend's returned entity.
    Compiled(Submission),
    /// The backend failed. `submission` is the entity as loaded.
    Failed {
        submission: Submission,
        error: CompileError,
    },
}

/// Drives one compile request through the pipeline.
pub struct DispatchOrchestrator {
    classifier: RequestClassifier,
    repository: SubmissionRepository,
    registry: Arc<BackendRegistry>,
    publisher: ResultPublisher,
    failure_policy: CompileFailurePolicy,
    strict_request_types: bool,
    locks: Option<SubmissionLocks>,
}

impl DispatchOrchestrator {
    /// Wire an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        config: &DispatcherConfig,
        store: Arc<dyn SubmissionStore>,
        registry: Arc<BackendRegistry>,
        bus: Arc<dyn MessagePublisher>,
    ) -> Self {
        Self {
            classifier: RequestClassifier::new(),
            repository: SubmissionRepository::new(
                store,
                config.graded_collection.clone(),
                config.practice_collection.clone(),
            ),
            registry,
            publisher: ResultPublisher::new(bus, config.outbound_queue.clone(), config.wire_format),
            failure_policy: config.compile_failure_policy,
            strict_request_types: config.strict_request_types,
            locks: config.serialize_per_submission.then(SubmissionLocks::new),
        }
    }

    /// Process a single compile request.
    ///
    /// Publishes at most one result, loads at most one entity and invokes at
    /// most one backend.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` when the store or the bus fails. The request
    /// is lost in that case; nothing is retried.
    pub async fn dispatch(&self, request: CompileRequest) -> Result<DispatchOutcome, DispatchError> {
        let request = self.classifier.classify(request);

        if self.strict_request_types && request.kind == RequestKind::Unrecognized {
            return Ok(drop_request(DropReason::UnrecognizedType {
                request_type: request.request_type,
            }));
        }

        let _held = match &self.locks {
            Some(locks) => Some(locks.acquire(&request.submission_id).await),
            None => None,
        };

        let Some(submission) = self
            .repository
            .load(&request.submission_id, request.route)
            .await?
        else {
            return Ok(drop_request(DropReason::InvalidSubmission {
                submission_id: request.submission_id,
                route: request.route,
            }));
        };

        let outcome = match self.registry.resolve(&submission.language) {
            Resolution::Unsupported => {
                return Ok(drop_request(DropReason::UnsupportedLanguage {
                    submission_id: request.submission_id,
                    language: submission.language,
                }));
            }
            Resolution::PassThrough(_) => CompileOutcome::PassedThrough(submission),
            Resolution::Compile(backend) => {
                tracing::debug!(backend = backend.name(), "invoking compilation backend");
                match backend.compile(&submission, request.route).await {
                    Ok(compiled) => CompileOutcome::Compiled(compiled),
                    Err(error) => CompileOutcome::Failed { submission, error },
                }
            }
        };

        let (submission, disposition) = match outcome {
            CompileOutcome::PassedThrough(submission) => (submission, Disposition::PassedThrough),
            CompileOutcome::Compiled(submission) => {
                tracing::info!(
                    compile_status = ?submission.compile_status(),
                    "compilation finished"
                );
                (submission, Disposition::Compiled)
            }
            CompileOutcome::Failed { submission, error } => {
                tracing::error!(error = %error, policy = %self.failure_policy, "compilation backend failed");
                match self.failure_policy {
                    CompileFailurePolicy::Drop => {
                        return Ok(drop_request(DropReason::CompilationFailed {
                            submission_id: request.submission_id,
                            error: error.to_string(),
                        }));
                    }
                    CompileFailurePolicy::Publish => (
                        submission.with_compile_failure(CompileStatus::BackendError, error.to_string()),
                        Disposition::BackendFailed,
                    ),
                }
            }
        };

        self.publisher
            .publish(&CompileResult {
                submission,
                request_type: request.request_type,
            })
            .await?;

        Ok(DispatchOutcome::Published {
            submission_id: request.submission_id,
            route: request.route,
            disposition,
        })
    }
}

fn drop_request(reason: DropReason) -> DispatchOutcome {
    tracing::warn!(reason = reason.label(), "{reason}");
    DispatchOutcome::Dropped(reason)
}

// ---------------------------------------------------------------------------
// DispatchService
// ---------------------------------------------------------------------------

/// `tower::Service` view of a shared orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct DispatchService {
    orchestrator: Arc<DispatchOrchestrator>,
}

impl DispatchService {
    #[must_use]
    pub fn new(orchestrator: Arc<DispatchOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl Service<CompileRequest> for DispatchService {
    type Response = DispatchOutcome;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<DispatchOutcome, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: CompileRequest) -> Self::Future {
        let orchestrator = Arc::clone(&self.orchestrator);
        Box::pin(async move { orchestrator.dispatch(request).await })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
