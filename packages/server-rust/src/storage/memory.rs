//! In-memory [`SubmissionStore`] backed by [`DashMap`].

use async_trait::async_trait;
use dashmap::DashMap;
use judge_dispatch_core::Submission;

use crate::traits::SubmissionStore;

/// Collections of submissions keyed by id, safe for concurrent reads.
pub struct InMemorySubmissionStore {
    collections: DashMap<String, DashMap<String, Submission>>,
}

impl InMemorySubmissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }

    /// Insert or replace a submission. Returns the previous record, if any.
    pub fn insert(&self, collection: &str, submission: Submission) -> Option<Submission> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(submission.id.clone(), submission)
    }

    /// Number of records in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }
}

impl Default for InMemorySubmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> anyhow::Result<Option<Submission>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.get(id).map(|s| s.clone())))
    }
}
