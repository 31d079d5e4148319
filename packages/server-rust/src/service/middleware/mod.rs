//! Tower middleware for the dispatch pipeline.
//!
//! - [`metrics`]: Request timing and outcome counting via `tracing` spans and the `metrics` facade
//! - [`pipeline`]: Composes the layers around the orchestrator service

pub mod metrics;
pub mod pipeline;

pub use metrics::MetricsLayer;
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
