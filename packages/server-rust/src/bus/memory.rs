//! In-process message bus with no-ack, at-most-once delivery.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::traits::{Delivery, MessagePublisher, Subscription};

struct QueueState {
    tx: mpsc::UnboundedSender<Delivery>,
    /// Taken by the first subscriber.
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl QueueState {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// Named queues backed by unbounded channels.
///
/// Messages published before anyone subscribes are buffered. Every publish is
/// also recorded so tests can inspect what left the dispatcher.
pub struct InMemoryBus {
    queues: DashMap<String, QueueState>,
    log: Mutex<Vec<(String, Bytes)>>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Take the single consumer end of a queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue already has a subscriber.
    pub fn subscribe(&self, queue: &str) -> anyhow::Result<InMemorySubscription> {
        let mut state = self
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueState::new);
        let rx = state
            .rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("queue {queue} already has a subscriber"))?;
        Ok(InMemorySubscription { rx })
    }

    /// Close a queue. Its subscription ends once buffered messages are drained.
    pub fn close(&self, queue: &str) {
        self.queues.remove(queue);
    }

    /// Payloads published to a queue so far, in order.
    #[must_use]
    pub fn published(&self, queue: &str) -> Vec<Bytes> {
        self.log
            .lock()
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBus {
    async fn publish(&self, queue: &str, payload: Bytes) -> anyhow::Result<()> {
        self.log.lock().push((queue.to_string(), payload.clone()));
        let state = self
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueState::new);
        // A dropped subscriber loses the message, as a no-ack consumer would.
        let _ = state.tx.send(Delivery {
            queue: queue.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Consumer end of an [`InMemoryBus`] queue.
pub struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}
