//! WorkerGroup - pipeline workers fed by the run queue.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::pipeline::Pipeline;
use crate::queue::RunQueue;

/// Worker group handle.
/// - `request_shutdown` stops workers from taking new runs
/// - `shutdown_and_join` also waits for runs in flight to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, queue: Arc<dyn RunQueue>, pipeline: Arc<Pipeline>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let queue = Arc::clone(&queue);
            let pipeline = Arc::clone(&pipeline);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, pipeline, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(error) = join.await {
                tracing::error!(%error, "worker task failed");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn RunQueue>,
    pipeline: Arc<Pipeline>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // pop waits for work, so race it against shutdown
        let run_id = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            run_id = queue.pop() => run_id,
        };

        // failures are journaled and logged by the pipeline
        match pipeline.execute(run_id).await {
            Ok(_) => tracing::debug!(worker_id, %run_id, "run finished"),
            Err(error) => tracing::debug!(worker_id, %run_id, %error, "run ended with error"),
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}
