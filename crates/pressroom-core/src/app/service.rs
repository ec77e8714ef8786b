//! PipelineService - submission and status queries.
//!
//! Submission validates the request, journals a Queued run and enqueues it;
//! it never waits for the pipeline. Progress is observed through `status`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::PipelineCounts;
use crate::domain::{RenderRequest, RunId, RunRecord, RunStatus, ValidationError};
use crate::ports::{Clock, IdGenerator, RunStore, StoreError};
use crate::queue::RunQueue;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: RunId,
    pub details: RunStatus,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("run journal: {0}")]
    Store(#[from] StoreError),

    #[error("service is shutting down")]
    Closed,
}

pub struct PipelineService {
    store: Arc<dyn RunStore>,
    queue: Arc<dyn RunQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl PipelineService {
    pub fn new(
        store: Arc<dyn RunStore>,
        queue: Arc<dyn RunQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            queue,
            ids,
            clock,
            closed: AtomicBool::new(false),
        }
    }

    /// Validate and enqueue a render request.
    ///
    /// Malformed input is rejected before a run exists.
    pub async fn submit(&self, url: &str, email: &str) -> Result<Submission, SubmitError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubmitError::Closed);
        }
        let request = RenderRequest::new(url, email)?;

        let record = RunRecord::new(self.ids.generate_run_id(), request, self.clock.now());
        self.store.create(&record).await?;
        self.queue.push(record.run_id).await;
        tracing::info!(run_id = %record.run_id, url, "run submitted");

        Ok(Submission {
            id: record.run_id,
            details: record.status(),
        })
    }

    pub async fn status(&self, run_id: RunId) -> Result<Option<RunStatus>, StoreError> {
        Ok(self.store.load(run_id).await?.map(|r| r.status()))
    }

    /// Poll `status` until the run is Complete or Errored.
    pub async fn wait(&self, run_id: RunId, poll: Duration) -> Result<RunStatus, StoreError> {
        loop {
            let status = self.status(run_id).await?.ok_or(StoreError::NotFound(run_id))?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Re-enqueue every journaled run that has not reached a terminal state.
    pub async fn resume(&self) -> Result<usize, StoreError> {
        let unfinished = self.store.list_unfinished().await?;
        for run_id in &unfinished {
            self.queue.push(*run_id).await;
        }
        if !unfinished.is_empty() {
            tracing::info!(runs = unfinished.len(), "resumed unfinished runs");
        }
        Ok(unfinished.len())
    }

    pub async fn counts(&self) -> Result<PipelineCounts, StoreError> {
        let records = self.store.list().await?;
        Ok(PipelineCounts::from_records(&records))
    }

    /// Reject further submissions.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
