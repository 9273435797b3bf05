//! Observability (metrics counters, tracing setup)

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    batches_submitted: AtomicU64,
    tasks_enqueued: AtomicU64,
    tasks_leased: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    stages_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_submitted(&self, tasks: usize) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.tasks_enqueued.fetch_add(tasks as u64, Ordering::Relaxed);
        tracing::debug!(counter = "batches_submitted", tasks, "Metric incremented");
    }

    pub fn task_leased(&self) {
        self.tasks_leased.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_leased", "Metric incremented");
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_completed", "Metric incremented");
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_failed", "Metric incremented");
    }

    pub fn stage_failed(&self) {
        self.stages_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "stages_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_leased: self.tasks_leased.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            stages_failed: self.stages_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_submitted: u64,
    pub tasks_enqueued: u64,
    pub tasks_leased: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub stages_failed: u64,
}
