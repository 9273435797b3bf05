//! Single worker loop: lease, process, acknowledge, idle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::observability::Metrics;
use crate::processor::{ImageProcessor, ProcessError};
use crate::queue::{FjallQueue, LeasedTask};

pub(crate) struct Worker {
    pub id: usize,
    pub queue: Arc<FjallQueue>,
    pub processor: ImageProcessor,
    pub metrics: Arc<Metrics>,
    pub idle_delay: Duration,
    pub drain_timeout: Duration,
    pub shutdown: watch::Receiver<bool>,
}

/// How one leased task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    Panicked,
    /// Aborted after the drain deadline
    Abandoned,
}

impl Worker {
    pub async fn run(mut self) {
        debug!(worker = self.id, "Worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.queue.lease() {
                Ok(Some(leased)) => {
                    self.metrics.task_leased();
                    self.execute(leased).await;
                    if self.idle().await {
                        break;
                    }
                }
                Ok(None) => {
                    if self.idle().await {
                        break;
                    }
                }
                Err(err) => {
                    error!(worker = self.id, error = %err, "Failed to lease task");
                    if self.idle().await {
                        break;
                    }
                }
            }
        }

        debug!(worker = self.id, "Worker stopped");
    }

    /// Sleep for the idle delay. Returns true when shutdown was requested.
    async fn idle(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.idle_delay) => false,
            changed = self.shutdown.changed() => changed.is_err() || *self.shutdown.borrow(),
        }
    }

    /// Run one task in its own tokio task so a panic stays contained.
    pub(crate) async fn execute(&mut self, leased: LeasedTask) -> TaskOutcome {
        let LeasedTask {
            lease,
            task,
            deliveries,
        } = leased;
        let image_id = task.image_id.clone();
        info!(worker = self.id, %lease, image_id = %image_id, deliveries, "Task leased");

        let processor = self.processor.clone();
        let mut handle = tokio::spawn(async move { processor.process(&task).await });

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = shutdown_requested(&mut self.shutdown) => {
                info!(worker = self.id, image_id = %image_id, "Draining in-flight task");
                match timeout(self.drain_timeout, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        handle.abort();
                        warn!(worker = self.id, image_id = %image_id, "Drain deadline passed, task left for redelivery");
                        self.metrics.task_failed();
                        return TaskOutcome::Abandoned;
                    }
                }
            }
        };

        match joined {
            Ok(Ok(report)) => {
                if let Err(err) = self.queue.ack(&lease) {
                    // The lease expired and the task went to another worker
                    warn!(worker = self.id, %lease, image_id = %image_id, error = %err, "Ack failed");
                }
                self.metrics.task_completed();
                debug!(worker = self.id, image_id = %image_id, stages = report.stages.len(), "Task acknowledged");
                TaskOutcome::Completed
            }
            Ok(Err(err)) => {
                match &err {
                    ProcessError::Incomplete { report, .. } => {
                        let failed: Vec<String> =
                            report.failures().map(|o| o.stage.to_string()).collect();
                        warn!(worker = self.id, image_id = %image_id, ?failed, "Task incomplete, will retry");
                    }
                    _ => warn!(worker = self.id, image_id = %image_id, error = %err, "Task failed, will retry"),
                }
                self.metrics.task_failed();
                TaskOutcome::Failed
            }
            Err(err) => {
                error!(worker = self.id, image_id = %image_id, error = %err, "Task panicked, will retry");
                self.metrics.task_failed();
                TaskOutcome::Panicked
            }
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also counts as shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
}
