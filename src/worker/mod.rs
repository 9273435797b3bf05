//! Worker pool consuming the import queue.
//!
//! Each worker leases one task at a time and runs it through the
//! [`ImageProcessor`]. A task is acknowledged only after `process` returns
//! `Ok`; failures and panics leave the lease to expire so the task is
//! delivered again.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pool = WorkerPool::spawn(&config.worker, queue, processor, metrics);
//! // ... serve requests ...
//! pool.shutdown().await;
//! ```

pub mod runner;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::WorkerConfig;
use crate::observability::Metrics;
use crate::processor::ImageProcessor;
use crate::queue::FjallQueue;
use runner::Worker;

/// Fixed-size set of queue consumers sharing one shutdown signal
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start `config.concurrency` workers on the current runtime.
    pub fn spawn(
        config: &WorkerConfig,
        queue: Arc<FjallQueue>,
        processor: ImageProcessor,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        for id in 0..config.concurrency {
            let worker = Worker {
                id,
                queue: queue.clone(),
                processor: processor.clone(),
                metrics: metrics.clone(),
                idle_delay: config.idle_delay(),
                drain_timeout: config.drain_timeout(),
                shutdown: shutdown_rx.clone(),
            };
            workers.spawn(worker.run());
        }

        info!(workers = config.concurrency, "Worker pool started");
        Self { shutdown, workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop leasing, let in-flight tasks drain, and wait for every worker.
    pub async fn shutdown(mut self) {
        info!("Stopping worker pool");
        // Errors only when every worker already exited
        let _ = self.shutdown.send(true);

        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "Worker exited abnormally");
            }
        }
        info!("Worker pool stopped");
    }
}
