//! In-memory run queue.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::RunQueue;
use crate::domain::RunId;

/// FIFO of run ids with a wake-up for idle workers.
///
/// The lock is only held for the push/pop itself, never across an await.
#[derive(Default)]
pub struct InMemoryRunQueue {
    ready: Mutex<VecDeque<RunId>>,
    notify: Notify,
}

impl InMemoryRunQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunQueue for InMemoryRunQueue {
    async fn push(&self, run_id: RunId) {
        self.ready.lock().await.push_back(run_id);
        // Notify outside the lock; a stored permit covers a worker that is between checks.
        self.notify.notify_one();
    }

    async fn pop(&self) -> RunId {
        loop {
            if let Some(run_id) = self.ready.lock().await.pop_front() {
                return run_id;
            }
            self.notify.notified().await;
        }
    }

    async fn len(&self) -> usize {
        self.ready.lock().await.len()
    }
}
