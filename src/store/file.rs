//! JSON-file [`ProgressStore`]: `<dir>/<learner_id>.json`.
//!
//! Each file holds `{"version": n, "value": {..}}`.  Writes go to a
//! temporary file in the same directory which then replaces the target, so a
//! reader never sees a half-written record.  Version checks and the replace
//! happen under one lock, which makes the store safe for a single process;
//! several processes sharing a directory are not coordinated.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::progression::LearnerProgress;
use crate::store::{ProgressStore, StoreError, Versioned};

pub struct JsonFileProgressStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileProgressStore {
    /// Store records under `dir`, creating it on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, learner_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !learner_id.is_empty()
            && !learner_id.starts_with('.')
            && learner_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
        if !valid {
            return Err(StoreError::InvalidId(learner_id.to_string()));
        }
        Ok(self.dir.join(format!("{learner_id}.json")))
    }
}

fn load(path: &Path) -> Result<Option<Versioned<LearnerProgress>>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let record = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(record))
}

fn persist(path: &Path, record: &Versioned<LearnerProgress>) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let temp_file = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        serde_json::to_writer_pretty(&mut writer, record)?;
        writer.flush()?;
    }
    temp_file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

#[async_trait]
impl ProgressStore for JsonFileProgressStore {
    async fn read(
        &self,
        learner_id: &str,
    ) -> Result<Option<Versioned<LearnerProgress>>, StoreError> {
        let path = self.path_for(learner_id)?;
        blocking(move || load(&path)).await
    }

    async fn write(
        &self,
        learner_id: &str,
        progress: &LearnerProgress,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let path = self.path_for(learner_id)?;
        let learner_id = learner_id.to_string();
        let progress = progress.clone();

        let _guard = self.write_lock.lock().await;
        blocking(move || {
            let actual = load(&path)?.map_or(0, |r| r.version);
            if actual != expected_version {
                return Err(StoreError::VersionConflict {
                    learner_id,
                    expected: expected_version,
                    actual,
                });
            }

            let version = expected_version + 1;
            persist(
                &path,
                &Versioned {
                    version,
                    value: progress,
                },
            )?;
            log::debug!("store: wrote {} v{}", path.display(), version);
            Ok(version)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::progression::PracticeWord;

    fn progress(id: &str) -> LearnerProgress {
        LearnerProgress::new(
            id,
            "en",
            Some(PracticeWord::new("en-cat", "cat", vec!["kæt".into()])),
        )
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileProgressStore::new(dir.path().join("progress"));

        let v = store.write("alice", &progress("alice"), 0).await.unwrap();
        assert_eq!(v, 1);

        let stored = store.read("alice").await.unwrap().expect("record");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value, progress("alice"));
        assert!(dir.path().join("progress/alice.json").exists());
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileProgressStore::new(dir.path());
        assert!(store.read("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_version_is_rejected_and_file_kept() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileProgressStore::new(dir.path());
        store.write("alice", &progress("alice"), 0).await.unwrap();

        let mut changed = progress("alice");
        changed.calibration_index = 2;
        store.write("alice", &changed, 1).await.unwrap();

        let err = store.write("alice", &progress("alice"), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { actual: 2, .. }));

        let stored = store.read("alice").await.unwrap().unwrap();
        assert_eq!(stored.value.calibration_index, 2);
    }

    #[tokio::test]
    async fn path_like_learner_ids_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileProgressStore::new(dir.path());
        for id in ["", "../escape", "a/b", ".hidden"] {
            let err = store.read(id).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidId(_)), "{id:?}");
        }
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("carol.json"), "{ not json").unwrap();
        let store = JsonFileProgressStore::new(dir.path());
        let err = store.read("carol").await.unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
