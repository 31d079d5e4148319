//! Pipeline composition: wraps the orchestrator service with middleware layers.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::orchestrator::{DispatchOrchestrator, DispatchService};

/// The composed service stack the consume loop drives.
pub type DispatchPipeline = MetricsService<DispatchService>;

/// Build the dispatch pipeline around a shared orchestrator.
///
/// Concurrency is bounded by the consume loop, not by a layer here: rejecting
/// a request would lose it, since deliveries are never redelivered.
#[must_use]
pub fn build_dispatch_pipeline(orchestrator: Arc<DispatchOrchestrator>) -> DispatchPipeline {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .service(DispatchService::new(orchestrator))
}

#[cfg(test)]
mod tests {
    use judge_dispatch_core::{CompileRequest, Submission};
    use tower::ServiceExt;

    use super::*;
    use crate::bus::InMemoryBus;
    use crate::service::config::DispatcherConfig;
    use crate::service::outcome::DispatchOutcome;
    use crate::service::registry::BackendRegistry;
    use crate::storage::InMemorySubmissionStore;

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let store = Arc::new(InMemorySubmissionStore::new());
        store.insert("submissions", Submission::new("A", "python", "print(1)"));
        let bus = Arc::new(InMemoryBus::new());
        let orchestrator = Arc::new(DispatchOrchestrator::new(
            &DispatcherConfig::default(),
            store,
            Arc::new(BackendRegistry::new()),
            bus.clone(),
        ));

        let svc = build_dispatch_pipeline(orchestrator);
        let outcome = svc
            .clone()
            .oneshot(CompileRequest::new("A", "contest_submission"))
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Published { .. }));

        let outcome = svc
            .oneshot(CompileRequest::new("missing", "contest_submission"))
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dropped(_)));
        assert_eq!(bus.published("processed_submission").len(), 1);
    }
}
