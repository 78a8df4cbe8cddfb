use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

/// Long-lived workers that keep calling `process_next`.
/// - idle workers park until the next submit or shutdown
/// - `shutdown_and_join()` stops taking new tasks and waits for the
///   in-flight ones to finish
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawn `n` workers on the current runtime.
    pub fn spawn(n: usize, scheduler: Arc<Scheduler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let scheduler = Arc::clone(&scheduler);
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, scheduler, &mut rx).await
            }));
        }
        info!(workers = n, "worker pool started");

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every worker to stop after its current task.
    pub fn request_shutdown(&self) {
        // receiver が既に drop されていても無視してよい
        let _ = self.shutdown_tx.send(true);
    }

    /// Shut down and wait for all workers. Returns how many tasks the pool
    /// finished over its lifetime.
    pub async fn shutdown_and_join(self) -> Result<usize, SchedulerError> {
        self.request_shutdown();
        let mut processed = 0;
        for join in self.joins {
            processed += join
                .await
                .map_err(|e| SchedulerError::WorkerFailed(e.to_string()))?;
        }
        info!(processed, "worker pool stopped");
        Ok(processed)
    }
}

async fn worker_loop(
    worker_id: usize,
    scheduler: Arc<Scheduler>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> usize {
    let mut processed = 0;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // process_next は shutdown と select しない。
        // 実行中の task を途中でキャンセルしないため（待機中だけ競合させる）。
        match scheduler.process_next().await {
            Ok(Some(record)) => {
                processed += 1;
                debug!(
                    worker_id,
                    task_id = %record.id(),
                    status = %record.status(),
                    "worker finished task"
                );
                continue;
            }
            Ok(None) => {}
            Err(err) => {
                error!(worker_id, error = %err, "worker stopping");
                break;
            }
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = scheduler.work_available() => {}
        }
    }
    processed
}
