//! Fixed-size pool of generation workers.
//!
//! Each task owns at most one job at a time. An idle task polls the queue on
//! `poll_interval`; a busy one drains the queue back to back until it finds
//! nothing to lease. Cancelling the token stops leasing new work and cuts
//! short any backoff in progress; a job interrupted that way keeps its lease
//! until it expires and is then redelivered.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::clock::log_millis;
use crate::worker::GenerationWorker;

pub struct WorkerPool {
    workers: Vec<GenerationWorker>,
    poll_interval: Duration,
}

impl WorkerPool {
    /// `concurrency` copies of `worker`, named `{id}-{n}`.
    pub fn new(worker: &GenerationWorker, concurrency: usize, poll_interval: Duration) -> Self {
        let workers = (0..concurrency.max(1))
            .map(|n| worker.with_id(format!("{}-{n}", worker.id())))
            .collect();
        Self {
            workers,
            poll_interval,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Start every worker task. Await the returned set to wait for shutdown.
    pub fn spawn(self, cancel: CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for worker in self.workers {
            tasks.spawn(run_worker(worker, self.poll_interval, cancel.clone()));
        }
        tasks
    }

    /// Run until `cancel` fires and every task has stopped.
    pub async fn run(self, cancel: CancellationToken) {
        let size = self.size();
        tracing::info!(
            workers = size,
            poll_interval_ms = log_millis(self.poll_interval),
            "Worker pool started",
        );
        let mut tasks = self.spawn(cancel);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!(workers = size, "Worker pool stopped");
    }
}

async fn run_worker(worker: GenerationWorker, poll_interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(worker = %worker.id(), "Worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                drain(&worker, &cancel).await;
            }
        }
    }
}

/// Process entries until the queue is empty, an error occurs or shutdown
/// is requested.
async fn drain(worker: &GenerationWorker, cancel: &CancellationToken) {
    while !cancel.is_cancelled() {
        match worker.process_next(cancel).await {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                tracing::error!(worker = %worker.id(), error = %e, "Queue cycle failed");
                break;
            }
        }
    }
}
