//! RunStore port - the run journal.
//!
//! The journal is the source of truth for every run: the request, step
//! results, attempts and decisions. Replay after a restart reads it back.
//!
//! # Implementations
//! - **InMemoryRunStore**: process lifetime only
//! - **FileRunStore**: one JSON document per run

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RunId, RunRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    NotFound(RunId),

    #[error("run already exists: {0}")]
    AlreadyExists(RunId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a new run. Fails if the id is taken.
    async fn create(&self, record: &RunRecord) -> Result<(), StoreError>;

    async fn load(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError>;

    /// Replace the stored record of an existing run.
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError>;

    /// All runs, oldest first.
    async fn list(&self) -> Result<Vec<RunRecord>, StoreError>;

    /// Ids of runs not yet Complete or Errored, oldest first.
    async fn list_unfinished(&self) -> Result<Vec<RunId>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.state.is_terminal())
            .map(|r| r.run_id)
            .collect())
    }
}
