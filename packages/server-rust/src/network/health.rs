//! Health, liveness and readiness endpoints for the dispatcher process.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use super::shutdown::{HealthState, ShutdownController};
use crate::service::consumer::ConsumeCounters;

/// Shared state for the health handlers.
#[derive(Clone)]
pub struct HealthAppState {
    pub shutdown: Arc<ShutdownController>,
    pub counters: Arc<ConsumeCounters>,
    pub start_time: Instant,
}

/// Lifecycle state, in-flight count, uptime and delivery counters as JSON.
///
/// Always 200; the `state` field says whether the dispatcher is consuming.
pub async fn health_handler(State(state): State<HealthAppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "deliveries": state.counters.snapshot(),
    }))
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 only while the consume loop is taking deliveries.
pub async fn readiness_handler(State(state): State<HealthAppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[must_use]
pub fn health_router(state: HealthAppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}

/// Serve the health endpoints on an already bound listener until `shutdown`
/// resolves.
///
/// # Errors
///
/// Returns an error if the server hits a fatal I/O error.
pub async fn serve_health(
    listener: TcpListener,
    state: HealthAppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "health endpoints listening");

    axum::serve(listener, health_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
