//! `HashMap`-backed [`ProgressStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::progression::LearnerProgress;
use crate::store::{ProgressStore, StoreError, Versioned};

/// Keeps every record in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    records: Mutex<HashMap<String, Versioned<LearnerProgress>>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Versioned<LearnerProgress>>> {
        // A poisoned map is still consistent: every write replaces a whole entry.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn read(
        &self,
        learner_id: &str,
    ) -> Result<Option<Versioned<LearnerProgress>>, StoreError> {
        Ok(self.lock().get(learner_id).cloned())
    }

    async fn write(
        &self,
        learner_id: &str,
        progress: &LearnerProgress,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut records = self.lock();
        let actual = records.get(learner_id).map_or(0, |r| r.version);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                learner_id: learner_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let version = expected_version + 1;
        records.insert(
            learner_id.to_string(),
            Versioned {
                version,
                value: progress.clone(),
            },
        );
        Ok(version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(id: &str) -> LearnerProgress {
        LearnerProgress::new(id, "en", None)
    }

    #[tokio::test]
    async fn read_of_unknown_learner_is_none() {
        let store = InMemoryProgressStore::new();
        assert!(store.read("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_bumps_version() {
        let store = InMemoryProgressStore::new();
        assert_eq!(store.write("a", &progress("a"), 0).await.unwrap(), 1);
        assert_eq!(store.write("a", &progress("a"), 1).await.unwrap(), 2);
        let stored = store.read("a").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.learner_id, "a");
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let store = InMemoryProgressStore::new();
        store.write("a", &progress("a"), 0).await.unwrap();
        store.write("a", &progress("a"), 1).await.unwrap();

        let err = store.write("a", &progress("a"), 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 1, actual: 2, .. }
        ));
    }

    #[tokio::test]
    async fn second_create_is_rejected() {
        let store = InMemoryProgressStore::new();
        store.write("a", &progress("a"), 0).await.unwrap();
        assert!(store.write("a", &progress("a"), 0).await.is_err());
    }
}
