//! Compile dispatch worker: consumes compile requests, loads the submission,
//! optionally compiles it, and publishes the result for the judge.

pub mod backend;
pub mod bus;
pub mod network;
pub mod observability;
pub mod service;
pub mod storage;
pub mod traits;

pub use traits::{Delivery, MessagePublisher, SubmissionStore, Subscription};
