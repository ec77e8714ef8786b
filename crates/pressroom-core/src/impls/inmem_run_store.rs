//! InMemoryRunStore - run journal kept for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RunId, RunRecord};
use crate::ports::{RunStore, StoreError};

#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<RunId, RunRecord>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, record: &RunRecord) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().await;
        if runs.contains_key(&record.run_id) {
            return Err(StoreError::AlreadyExists(record.run_id));
        }
        runs.insert(record.run_id, record.clone());
        Ok(())
    }

    async fn load(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.runs.lock().await.get(&run_id).cloned())
    }

    async fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().await;
        match runs.get_mut(&record.run_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(record.run_id)),
        }
    }

    async fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        let mut records: Vec<RunRecord> = self.runs.lock().await.values().cloned().collect();
        records.sort_by_key(|r| (r.created_at, r.run_id));
        Ok(records)
    }
}
