//! Compile dispatch pipeline.
//!
//! 1. **Classification** (`classify`): request type -> route
//! 2. **Loading** (`repository`): submission lookup in the routed collection
//! 3. **Backend resolution** (`registry`): compile, pass through, or reject
//! 4. **Publishing** (`publisher`): encoded `{submission, type}` to the outbound queue
//! 5. **Middleware** (`middleware`): Tower layers around the orchestrator
//! 6. **Consumption** (`consumer`): bounded-concurrency loop over a subscription

pub mod classify;
pub mod config;
pub mod consumer;
pub mod locks;
pub mod middleware;
pub mod orchestrator;
pub mod outcome;
pub mod publisher;
pub mod registry;
pub mod repository;

pub use classify::{ClassifiedRequest, RequestClassifier};
pub use config::{CompileFailurePolicy, DispatcherConfig};
pub use consumer::{ConsumeCounters, ConsumeLoop, ConsumeStats};
pub use middleware::{build_dispatch_pipeline, DispatchPipeline};
pub use orchestrator::{DispatchOrchestrator, DispatchService};
pub use outcome::{DispatchError, DispatchOutcome, Disposition, DropReason};
pub use registry::{BackendRegistry, Resolution};
