//! FileRunStore - run journal on the local filesystem.
//!
//! One `<run_id>.json` document per run. Writes go to a temporary file that
//! is renamed over the old document, so a crash leaves either the previous
//! or the new version on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::{RunId, RunRecord};
use crate::ports::{RunStore, StoreError};

pub struct FileRunStore {
    dir: PathBuf,
}

impl FileRunStore {
    /// Open (and create if needed) a journal directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, run_id: RunId) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    async fn write(&self, record: &RunRecord) -> Result<(), StoreError> {
        let path = self.path_of(record.run_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn create(&self, record: &RunRecord) -> Result<(), StoreError> {
        if fs::try_exists(self.path_of(record.run_id)).await? {
            return Err(StoreError::AlreadyExists(record.run_id));
        }
        self.write(record).await
    }

    async fn load(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError> {
        match fs::read(self.path_of(run_id)).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        if !fs::try_exists(self.path_of(record.run_id)).await? {
            return Err(StoreError::NotFound(record.run_id));
        }
        self.write(record).await
    }

    async fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let body = fs::read(&path).await?;
            match serde_json::from_slice::<RunRecord>(&body) {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable journal entry");
                }
            }
        }
        records.sort_by_key(|r| (r.created_at, r.run_id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RenderRequest, RunOutcome, RunState};
    use chrono::Utc;
    use ulid::Ulid;

    fn record() -> RunRecord {
        let request = RenderRequest::new("https://example.com/a", "x@y.com").unwrap();
        RunRecord::new(RunId::from_ulid(Ulid::new()), request, Utc::now())
    }

    #[tokio::test]
    async fn records_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = record();
        {
            let store = FileRunStore::open(dir.path()).await.unwrap();
            store.create(&run).await.unwrap();
            run.mark_complete(RunOutcome::delivered(), Utc::now());
            store.save(&run).await.unwrap();
        }

        let store = FileRunStore::open(dir.path()).await.unwrap();
        let loaded = store.load(run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded, run);
        assert_eq!(loaded.state, RunState::Complete);
    }

    #[tokio::test]
    async fn missing_run_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRunStore::open(dir.path()).await.unwrap();
        assert!(store.load(RunId::from_ulid(Ulid::new())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRunStore::open(dir.path()).await.unwrap();
        let run = record();
        store.create(&run).await.unwrap();
        assert!(matches!(store.create(&run).await, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRunStore::open(dir.path()).await.unwrap();
        let run = record();
        store.create(&run).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let runs = store.list().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(store.list_unfinished().await.unwrap(), vec![run.run_id]);
    }
}
