//! Process lifecycle and operational HTTP surface.

pub mod health;
pub mod shutdown;

pub use health::{health_router, serve_health, HealthAppState};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
