//! Per-submission mutual exclusion.
//!
//! Optional: when enabled, concurrent requests for the same submission id are
//! processed one after another instead of racing through load, compile and
//! publish. Entries are removed once nobody holds or waits on them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Table of in-flight submission ids.
#[derive(Default)]
pub struct SubmissionLocks {
    table: Arc<LockTable>,
}

impl SubmissionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `submission_id`, then hold it until
    /// the returned guard is dropped.
    pub async fn acquire(&self, submission_id: &str) -> SubmissionGuard {
        let mutex = Arc::clone(
            self.table
                .entry(submission_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = mutex.lock_owned().await;
        SubmissionGuard {
            guard: Some(guard),
            key: submission_id.to_string(),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of ids currently held or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Holds one submission id. Releases it on drop.
pub struct SubmissionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    table: Arc<LockTable>,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        // Unlock first so the table entry is the only remaining owner when idle.
        drop(self.guard.take());
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_id_is_serialized() {
        let locks = Arc::new(SubmissionLocks::new());
        let active = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("A").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let locks = SubmissionLocks::new();
        let _a = locks.acquire("A").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("B")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_ids_are_removed() {
        let locks = SubmissionLocks::new();
        {
            let _guard = locks.acquire("A").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
