use async_trait::async_trait;
use bytes::Bytes;
use judge_dispatch_core::Submission;

/// Read access to the persisted submission collections.
/// Implementations: in-memory (tests) and JSON files on disk.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Load a submission by primary identifier from the named collection.
    ///
    /// Returns `Ok(None)` when no record exists. Errors are reserved for the
    /// store being unreachable or returning an unreadable record.
    async fn find_by_id(&self, collection: &str, id: &str) -> anyhow::Result<Option<Submission>>;
}

/// Outbound side of the message bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Hand an encoded payload to the named queue. No retry is attempted.
    async fn publish(&self, queue: &str, payload: Bytes) -> anyhow::Result<()>;
}

/// A single message handed over by the bus.
///
/// Deliveries are consumed on receipt: there is no acknowledgment and no
/// redelivery, whatever happens to the request afterwards.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    pub payload: Bytes,
}

/// Inbound side of the message bus.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. `None` means the subscription has ended.
    ///
    /// Must be cancel safe: the consume loop drops this future on shutdown,
    /// and a message must not be lost when that happens.
    async fn next_delivery(&mut self) -> Option<Delivery>;
}
