//! Consume loop: pulls deliveries off a subscription and drives the dispatch
//! pipeline with bounded concurrency.
//!
//! A permit is taken before the next delivery is pulled, so at most
//! `max_in_flight` requests are ever off the queue and unfinished. Deliveries
//! are never acknowledged or redelivered; whatever fails is logged and lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use judge_dispatch_core::{CompileRequest, WireFormat};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tower::{Service, ServiceExt};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::network::ShutdownController;
use crate::service::config::DispatcherConfig;
use crate::service::outcome::{DispatchError, DispatchOutcome};
use crate::traits::Subscription;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Live delivery counters, shared with the health endpoint.
#[derive(Debug, Default)]
pub struct ConsumeCounters {
    received: AtomicU64,
    malformed: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl ConsumeCounters {
    #[must_use]
    pub fn snapshot(&self) -> ConsumeStats {
        ConsumeStats {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`ConsumeCounters`].
///
/// `received = malformed + published + dropped + failed` once the loop has
/// returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumeStats {
    pub received: u64,
    pub malformed: u64,
    pub published: u64,
    pub dropped: u64,
    /// Requests lost to store or bus errors, panics, or drain abort.
    pub failed: u64,
}

// ---------------------------------------------------------------------------
// ConsumeLoop
// ---------------------------------------------------------------------------

pub struct ConsumeLoop<S> {
    service: S,
    format: WireFormat,
    inbound_queue: String,
    max_in_flight: usize,
    drain_timeout: Duration,
    shutdown: Arc<ShutdownController>,
    counters: Arc<ConsumeCounters>,
}

impl<S> ConsumeLoop<S>
where
    S: Service<CompileRequest, Response = DispatchOutcome, Error = DispatchError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub fn new(service: S, config: &DispatcherConfig, shutdown: Arc<ShutdownController>) -> Self {
        Self {
            service,
            format: config.wire_format,
            inbound_queue: config.inbound_queue.clone(),
            max_in_flight: config.max_in_flight.max(1),
            drain_timeout: config.drain_timeout,
            shutdown,
            counters: Arc::new(ConsumeCounters::default()),
        }
    }

    #[must_use]
    pub fn counters(&self) -> Arc<ConsumeCounters> {
        Arc::clone(&self.counters)
    }

    /// Consume until the subscription ends or shutdown is triggered, then
    /// drain in-flight requests.
    ///
    /// Requests still running after the drain timeout are aborted and
    /// counted as failed.
    pub async fn run<Sub: Subscription>(self, mut subscription: Sub) -> ConsumeStats {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut stop = self.shutdown.shutdown_receiver();
        let mut tasks = JoinSet::new();

        self.shutdown.set_ready();
        tracing::info!(
            queue = %self.inbound_queue,
            max_in_flight = self.max_in_flight,
            "waiting for messages..."
        );

        loop {
            while let Some(finished) = tasks.try_join_next() {
                reap(&self.counters, finished);
            }

            let permit = tokio::select! {
                biased;
                () = stopped(&mut stop) => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                biased;
                () = stopped(&mut stop) => break,
                delivery = subscription.next_delivery() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        tracing::info!(queue = %self.inbound_queue, "subscription ended");
                        break;
                    }
                },
            };

            ConsumeCounters::bump(&self.counters.received);
            let delivery_id = Uuid::new_v4();

            let request: CompileRequest = match self.format.decode(&delivery.payload) {
                Ok(request) => request,
                Err(e) => {
                    ConsumeCounters::bump(&self.counters.malformed);
                    metrics::counter!("dispatch_malformed_total").increment(1);
                    tracing::warn!(
                        %delivery_id,
                        queue = %delivery.queue,
                        error = %DispatchError::MalformedRequest(e),
                        "skipping delivery"
                    );
                    continue;
                }
            };

            let span = info_span!(
                "delivery",
                %delivery_id,
                submission_id = %request.submission_id,
                request_type = %request.request_type,
            );
            let in_flight = self.shutdown.in_flight_guard();
            let service = self.service.clone();
            let counters = Arc::clone(&self.counters);

            tasks.spawn(
                async move {
                    let _permit = permit;
                    let _in_flight = in_flight;
                    match service.oneshot(request).await {
                        Ok(DispatchOutcome::Published { .. }) => {
                            ConsumeCounters::bump(&counters.published);
                        }
                        Ok(DispatchOutcome::Dropped(_)) => ConsumeCounters::bump(&counters.dropped),
                        Err(error) => {
                            ConsumeCounters::bump(&counters.failed);
                            tracing::error!(reason = error.label(), %error, "compile request lost");
                        }
                    }
                }
                .instrument(span),
            );
        }

        self.shutdown.trigger_shutdown();
        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "draining in-flight requests");
        }

        let counters = &self.counters;
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(finished) = tasks.join_next().await {
                reap(counters, finished);
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                remaining = tasks.len(),
                timeout_ms = u64::try_from(self.drain_timeout.as_millis()).unwrap_or(u64::MAX),
                "drain timed out, aborting remaining requests"
            );
            tasks.abort_all();
            while let Some(finished) = tasks.join_next().await {
                reap(counters, finished);
            }
        }

        self.shutdown.wait_for_drain(Duration::ZERO).await;
        let stats = self.counters.snapshot();
        tracing::info!(?stats, "consume loop stopped");
        stats
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    // The sender lives in the controller, which outlives the loop.
    let _ = stop.wait_for(|stopping| *stopping).await;
}

fn reap(counters: &ConsumeCounters, finished: Result<(), JoinError>) {
    match finished {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            ConsumeCounters::bump(&counters.failed);
            tracing::error!("request task panicked");
        }
        Err(_) => ConsumeCounters::bump(&counters.failed),
    }
}
