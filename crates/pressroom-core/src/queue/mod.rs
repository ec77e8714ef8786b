//! Queue module: run hand-off between submission and workers, plus retry policy.
//!
//! The queue only carries run ids. The run itself (request, step results,
//! history) lives in the journal, so a run id popped after a restart still
//! finds everything it needs there.

mod memory;
mod retry;

pub use memory::InMemoryRunQueue;
pub use retry::RetryPolicy;

use async_trait::async_trait;

use crate::domain::RunId;

/// Queue port (interface).
#[async_trait]
pub trait RunQueue: Send + Sync {
    /// Hand a run to the workers.
    async fn push(&self, run_id: RunId);

    /// Take the next run, waiting until one is available.
    async fn pop(&self) -> RunId;

    /// Runs waiting for a worker.
    async fn len(&self) -> usize;
}
