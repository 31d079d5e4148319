//! File-backed [`SubmissionStore`]: `<root>/<collection>/<id>.json`.
//!
//! Meant for local pipelines and fixtures. Ids that are not a single plain
//! path segment are treated as absent rather than resolved on disk.

use std::io;
use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use judge_dispatch_core::Submission;

use crate::traits::SubmissionStore;

/// Reads one JSON document per submission from a directory tree.
#[derive(Debug, Clone)]
pub struct FileSubmissionStore {
    root: PathBuf,
}

impl FileSubmissionStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, collection: &str, id: &str) -> Option<PathBuf> {
        if !is_plain_segment(collection) || !is_plain_segment(id) {
            return None;
        }
        Some(self.root.join(collection).join(format!("{id}.json")))
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl SubmissionStore for FileSubmissionStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> anyhow::Result<Option<Submission>> {
        let Some(path) = self.document_path(collection, id) else {
            tracing::debug!(collection, submission_id = id, "id is not a plain path segment");
            return Ok(None);
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        let submission: Submission = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Some(submission))
    }
}
