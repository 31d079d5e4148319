//! [`SubmissionStore`](crate::traits::SubmissionStore) implementations.
//!
//! - [`InMemorySubmissionStore`]: `DashMap`-backed collections for tests and embedding
//! - [`FileSubmissionStore`]: one JSON document per submission on disk

pub mod fs;
pub mod memory;

pub use fs::FileSubmissionStore;
pub use memory::InMemorySubmissionStore;
