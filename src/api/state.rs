use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::import::{BatchSubmitter, StatusTracker};
use crate::observability::Metrics;
use crate::queue::FjallQueue;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<FjallQueue>,
    pub catalog: Arc<dyn Catalog>,
    pub storage: Arc<StorageClient>,
    pub submitter: BatchSubmitter,
    pub tracker: StatusTracker,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        queue: Arc<FjallQueue>,
        catalog: Arc<dyn Catalog>,
        storage: Arc<StorageClient>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let submitter = BatchSubmitter::builder()
            .queue(queue.clone())
            .catalog(catalog.clone())
            .renditions(config.renditions.clone())
            .upload_prefix(config.storage.upload_prefix.clone())
            .metrics(metrics.clone())
            .build();
        let tracker = StatusTracker::new(catalog.clone());

        Self {
            config: Arc::new(config),
            queue,
            catalog,
            storage,
            submitter,
            tracker,
            metrics,
        }
    }
}
