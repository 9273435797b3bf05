use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogError, ImportTaskRow};
use crate::imaging::RenditionSpec;
use crate::observability::Metrics;
use crate::proto::{self, ImportTask};
use crate::queue::{FjallQueue, QueueError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Batch contains no files")]
    EmptyBatch,

    #[error("Album {0} does not exist")]
    UnknownAlbum(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, SubmitError>;

/// Turns a list of staged uploads into one batch of import tasks
#[derive(Clone, bon::Builder)]
pub struct BatchSubmitter {
    queue: Arc<FjallQueue>,
    catalog: Arc<dyn Catalog>,
    renditions: Vec<RenditionSpec>,
    #[builder(into)]
    upload_prefix: String,
    #[builder(default)]
    metrics: Arc<Metrics>,
}

impl BatchSubmitter {
    /// Register a status row and enqueue a task for every name.
    ///
    /// Returns the new batch id as soon as every task is durably queued;
    /// processing happens in the background.
    pub fn submit(&self, names: &[String], album_id: Option<&str>) -> Result<String> {
        if names.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        if let Some(album_id) = album_id {
            if self.catalog.get_album(album_id)?.is_none() {
                return Err(SubmitError::UnknownAlbum(album_id.to_string()));
            }
        }

        let batch_id = Uuid::now_v7().to_string();
        let renditions: Vec<proto::RenditionSpec> =
            self.renditions.iter().map(proto::RenditionSpec::from).collect();

        for name in names {
            let image_id = Uuid::now_v7().to_string();

            self.catalog.create_task_row(&ImportTaskRow {
                image_id: image_id.clone(),
                import_batch_id: batch_id.clone(),
                filename: name.clone(),
                is_processed: false,
            })?;

            let task = ImportTask {
                image_id: image_id.clone(),
                import_batch_id: batch_id.clone(),
                album_id: album_id.map(str::to_string),
                source_key: self.source_key(name),
                initial_import: true,
                renditions: renditions.clone(),
            };
            let seq = self.queue.enqueue(&task)?;
            debug!(batch_id = %batch_id, image_id = %image_id, seq, name = %name, "Task enqueued");
        }

        self.metrics.batch_submitted(names.len());
        info!(
            batch_id = %batch_id,
            files = names.len(),
            album_id = album_id.unwrap_or("-"),
            "Import batch submitted"
        );

        Ok(batch_id)
    }

    fn source_key(&self, name: &str) -> String {
        let prefix = self.upload_prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }
}
