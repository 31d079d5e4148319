//! Metrics middleware for compile requests.
//!
//! Records duration and outcome on a `dispatch` span and emits
//! `dispatch_requests_total{outcome,reason}` and `dispatch_duration_seconds`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use judge_dispatch_core::CompileRequest;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::outcome::{DispatchError, DispatchOutcome};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments compile requests with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

fn outcome_labels(result: &Result<DispatchOutcome, DispatchError>) -> (&'static str, &'static str) {
    match result {
        Ok(DispatchOutcome::Published { .. }) => ("published", "none"),
        Ok(DispatchOutcome::Dropped(reason)) => ("dropped", reason.label()),
        Err(err) => ("error", err.label()),
    }
}

impl<S> Service<CompileRequest> for MetricsService<S>
where
    S: Service<CompileRequest, Response = DispatchOutcome, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = DispatchOutcome;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<DispatchOutcome, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: CompileRequest) -> Self::Future {
        let span = info_span!(
            "dispatch",
            submission_id = %request.submission_id,
            request_type = %request.request_type,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = {
            let _entered = span.enter();
            self.inner.call(request)
        };

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();
                let (outcome, reason) = outcome_labels(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!("dispatch_requests_total", "outcome" => outcome, "reason" => reason)
                    .increment(1);
                metrics::histogram!("dispatch_duration_seconds").record(elapsed.as_secs_f64());

                tracing::info!(duration_ms, outcome, reason, "compile request complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
