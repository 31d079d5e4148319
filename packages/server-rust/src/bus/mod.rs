//! Message bus adapters.
//!
//! - [`InMemoryBus`]: per-queue channels for tests and embedding
//! - [`LineSubscription`] / [`LinePublisher`]: newline-delimited JSON over
//!   byte streams (stdin/stdout for local pipelines)

pub mod memory;
pub mod stdio;

pub use memory::{InMemoryBus, InMemorySubscription};
pub use stdio::{LinePublisher, LineSubscription};
