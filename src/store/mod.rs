//! Learner progress persistence.
//!
//! * [`ProgressStore`]: async trait for versioned read / write of
//!   [`LearnerProgress`] records.
//! * [`InMemoryProgressStore`]: `HashMap`-backed store for tests and
//!   embedding.
//! * [`JsonFileProgressStore`]: one JSON file per learner, replaced
//!   atomically on every write.
//!
//! Every record carries a version.  A write names the version it was derived
//! from and fails with [`StoreError::VersionConflict`] when the stored record
//! has moved on; version `0` means "no record yet".

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progression::{HistoryEntry, LearnerProgress};

pub use file::JsonFileProgressStore;
pub use memory::InMemoryProgressStore;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no progress record for learner {0:?}")]
    NotFound(String),

    #[error("version conflict for learner {learner_id:?}: expected {expected}, found {actual}")]
    VersionConflict {
        learner_id: String,
        expected: u64,
        actual: u64,
    },

    /// The learner id cannot be used as a storage key.
    #[error("invalid learner id {0:?}")]
    InvalidId(String),

    #[error("progress I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress record is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// Versioned
// ---------------------------------------------------------------------------

/// A stored value and the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

// ---------------------------------------------------------------------------
// ProgressStore trait
// ---------------------------------------------------------------------------

/// Versioned storage of one [`LearnerProgress`] per learner.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ProgressStore>`.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// The learner's record, or `None` when they were never enrolled.
    async fn read(&self, learner_id: &str)
        -> Result<Option<Versioned<LearnerProgress>>, StoreError>;

    /// Replace the record if it is still at `expected_version`.
    ///
    /// Returns the new version (`expected_version + 1`).
    async fn write(
        &self,
        learner_id: &str,
        progress: &LearnerProgress,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Append one history entry outside of a state transition.
    async fn append_history(&self, learner_id: &str, entry: HistoryEntry) -> Result<u64, StoreError> {
        let current = self
            .read(learner_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(learner_id.to_string()))?;
        let mut progress = current.value;
        progress.history.push(entry);
        self.write(learner_id, &progress, current.version).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::progression::{HistoryEvent, PracticeWord};

    #[tokio::test]
    async fn append_history_goes_through_versioned_write() {
        let store = InMemoryProgressStore::new();
        let progress = LearnerProgress::new(
            "alice",
            "en",
            Some(PracticeWord::new("en-cat", "cat", vec!["kæt".into()])),
        );
        store.write("alice", &progress, 0).await.unwrap();

        let entry = HistoryEntry {
            recorded_at: Utc::now(),
            event: HistoryEvent::WordClaimed,
            snapshot: progress.snapshot(),
            diagnosis: None,
            action: None,
            idempotency_key: None,
        };
        let version = store.append_history("alice", entry).await.unwrap();
        assert_eq!(version, 2);

        let stored = store.read("alice").await.unwrap().unwrap();
        assert_eq!(stored.value.history.len(), 1);
    }

    #[tokio::test]
    async fn append_history_for_unknown_learner_fails() {
        let store = InMemoryProgressStore::new();
        let progress = LearnerProgress::new("ghost", "en", None);
        let entry = HistoryEntry {
            recorded_at: Utc::now(),
            event: HistoryEvent::WordClaimed,
            snapshot: progress.snapshot(),
            diagnosis: None,
            action: None,
            idempotency_key: None,
        };
        let err = store.append_history("ghost", entry).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
