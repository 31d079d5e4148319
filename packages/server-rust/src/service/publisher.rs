//! Result publisher: encodes compile results and hands them to the bus.

use std::sync::Arc;

use bytes::Bytes;
use judge_dispatch_core::{CompileResult, WireFormat};

use super::outcome::DispatchError;
use crate::traits::MessagePublisher;

/// Publishes [`CompileResult`]s to the downstream queue.
///
/// A failed publish is not retried; the result is lost unless the transport
/// buffers it.
#[derive(Clone)]
pub struct ResultPublisher {
    bus: Arc<dyn MessagePublisher>,
    queue: String,
    format: WireFormat,
}

impl ResultPublisher {
    #[must_use]
    pub fn new(bus: Arc<dyn MessagePublisher>, queue: impl Into<String>, format: WireFormat) -> Self {
        Self {
            bus,
            queue: queue.into(),
            format,
        }
    }

    /// Encode and publish a result.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Encode` if the result cannot be serialized and
    /// `DispatchError::Publish` if the bus rejects it.
    pub async fn publish(&self, result: &CompileResult) -> Result<(), DispatchError> {
        let payload = self.format.encode(result).map_err(DispatchError::Encode)?;
        let bytes = payload.len();
        self.bus
            .publish(&self.queue, Bytes::from(payload))
            .await
            .map_err(DispatchError::Publish)?;
        tracing::debug!(queue = %self.queue, bytes, "compile result published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use judge_dispatch_core::Submission;

    use super::*;
    use crate::bus::InMemoryBus;

    fn result() -> CompileResult {
        CompileResult {
            submission: Submission::new("A", "python", "print(1)"),
            request_type: "problem_submission".to_string(),
        }
    }

    #[tokio::test]
    async fn publishes_json_document_to_queue() {
        let bus = Arc::new(InMemoryBus::new());
        let publisher = ResultPublisher::new(bus.clone(), "processed_submission", WireFormat::Json);

        publisher.publish(&result()).await.unwrap();

        let sent = bus.published("processed_submission");
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(value["type"], "problem_submission");
        assert_eq!(value["submission"]["_id"], "A");
        assert_eq!(value["submission"]["language"], "python");
    }

    #[tokio::test]
    async fn bus_failure_is_a_publish_error() {
        struct ClosedBus;

        #[async_trait::async_trait]
        impl MessagePublisher for ClosedBus {
            async fn publish(&self, _queue: &str, _payload: Bytes) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("channel closed"))
            }
        }

        let publisher = ResultPublisher::new(Arc::new(ClosedBus), "q", WireFormat::Json);
        let err = publisher.publish(&result()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Publish(_)));
    }
}
