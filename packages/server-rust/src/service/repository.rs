//! Submission repository gateway: route-aware loading from the store.

use std::sync::Arc;

use judge_dispatch_core::{Route, Submission};

use super::outcome::DispatchError;
use crate::traits::SubmissionStore;

/// Loads submissions from the collection selected by the routing token.
///
/// Loading has no side effects. A missing record is `Ok(None)`; only an
/// unavailable or misbehaving store is an error.
#[derive(Clone)]
pub struct SubmissionRepository {
    store: Arc<dyn SubmissionStore>,
    graded_collection: String,
    practice_collection: String,
}

impl SubmissionRepository {
    #[must_use]
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        graded_collection: impl Into<String>,
        practice_collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            graded_collection: graded_collection.into(),
            practice_collection: practice_collection.into(),
        }
    }

    #[must_use]
    pub fn collection(&self, route: Route) -> &str {
        match route {
            Route::Graded => &self.graded_collection,
            Route::Practice => &self.practice_collection,
        }
    }

    /// Load a submission by id for the given route.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Store` if the backing store fails.
    pub async fn load(&self, id: &str, route: Route) -> Result<Option<Submission>, DispatchError> {
        let collection = self.collection(route);
        let found = self
            .store
            .find_by_id(collection, id)
            .await
            .map_err(DispatchError::Store)?;
        tracing::debug!(collection, submission_id = id, found = found.is_some(), "submission lookup");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySubmissionStore;

    fn repo(store: Arc<InMemorySubmissionStore>) -> SubmissionRepository {
        SubmissionRepository::new(store, "submissions", "playground_submissions")
    }

    #[tokio::test]
    async fn graded_route_reads_graded_collection() {
        let store = Arc::new(InMemorySubmissionStore::new());
        store.insert("submissions", Submission::new("A", "python", "print(1)"));
        store.insert("playground_submissions", Submission::new("B", "cpp", ""));

        let repo = repo(store);
        assert!(repo.load("A", Route::Graded).await.unwrap().is_some());
        assert!(repo.load("A", Route::Practice).await.unwrap().is_none());
        assert!(repo.load("B", Route::Practice).await.unwrap().is_some());
        assert!(repo.load("B", Route::Graded).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_failure_is_a_store_error() {
        struct DownStore;

        #[async_trait::async_trait]
        impl SubmissionStore for DownStore {
            async fn find_by_id(&self, _: &str, _: &str) -> anyhow::Result<Option<Submission>> {
                Err(anyhow::anyhow!("connection refused"))
            }
        }

        let repo = SubmissionRepository::new(Arc::new(DownStore), "g", "p");
        let err = repo.load("A", Route::Graded).await.unwrap_err();
        assert!(matches!(err, DispatchError::Store(_)));
    }
}
