use std::any::Any;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{ProcessError, Result, StageError};
use super::report::{ProcessReport, Stage, StageStatus};
use crate::catalog::{Catalog, FileRecord, ImageRecord};
use crate::config::{CompletionPolicy, Config};
use crate::exif::{TagExtractor, populate_metadata};
use crate::imaging::{RenderError, RenditionSpec, probe, render_rendition, sniff_content_type};
use crate::observability::Metrics;
use crate::proto::{self, ImportTask};
use crate::storage::{StorageClient, StorageError};

type StageResult = std::result::Result<StageStatus, StageError>;

/// Tunables for [`ImageProcessor`]
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Bound on every object store call, metadata tool run and codec job
    pub operation_timeout: Duration,
    pub completion_policy: CompletionPolicy,
    pub dedupe_redelivery: bool,
    pub scratch_dir: PathBuf,
    pub media_prefix: String,
    pub public_base_url: String,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ProcessorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            operation_timeout: config.processor.operation_timeout(),
            completion_policy: config.processor.completion_policy,
            dedupe_redelivery: config.processor.dedupe_redelivery,
            scratch_dir: config
                .processor
                .scratch_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("darkroom")),
            media_prefix: config.storage.media_prefix.trim_matches('/').to_string(),
            public_base_url: config.storage.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Turns one [`ImportTask`] into catalogued metadata, a stored original and
/// its renditions.
///
/// Sub-stages run concurrently and are all joined before the image is marked
/// processed. A failing sub-stage does not stop its siblings. Codec failures
/// only skip their sub-stage and [`CompletionPolicy`] decides whether the task
/// still completes; any other sub-stage error fails the task.
#[derive(Clone, bon::Builder)]
pub struct ImageProcessor {
    storage: Arc<StorageClient>,
    catalog: Arc<dyn Catalog>,
    extractor: Arc<dyn TagExtractor>,
    #[builder(default)]
    options: ProcessorOptions,
    #[builder(default)]
    metrics: Arc<Metrics>,
}

impl ImageProcessor {
    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Process one task to completion.
    ///
    /// Errors leave the task for redelivery. Removing the staged upload is
    /// best effort and never fails the task.
    pub async fn process(&self, task: &ImportTask) -> Result<ProcessReport> {
        info!(
            image_id = %task.image_id,
            batch_id = %task.import_batch_id,
            source_key = %task.source_key,
            "Processing image"
        );

        let source = match self.fetch_source(&task.source_key).await {
            Ok(source) => source,
            Err(err) => {
                let missing = matches!(
                    err,
                    ProcessError::Fetch {
                        source: StorageError::NotFound(_),
                        ..
                    }
                );
                if missing && self.finished_earlier(task)? {
                    info!(image_id = %task.image_id, "Source already cleaned up by an earlier delivery");
                    return Ok(self.skipped_report(task));
                }
                return Err(err);
            }
        };
        let task = Arc::new(task.clone());

        let mut stages = JoinSet::new();
        if task.initial_import {
            stages.spawn(self.clone().metadata_stage(task.clone(), source.clone()));
            stages.spawn(self.clone().original_stage(task.clone(), source.clone()));
        }
        for spec in &task.renditions {
            stages.spawn(
                self.clone()
                    .rendition_stage(task.clone(), spec.clone(), source.clone()),
            );
        }

        let mut report = ProcessReport::new(&task.image_id);
        let mut panicked = None;
        let mut task_failure = None;

        while let Some(joined) = stages.join_next().await {
            match joined {
                Ok((stage, Ok(status))) => {
                    debug!(image_id = %task.image_id, %stage, ?status, "Sub-stage finished");
                    report.record(stage, status);
                }
                Ok((stage, Err(err))) => {
                    warn!(
                        image_id = %task.image_id,
                        %stage,
                        error = %err,
                        task_level = err.is_task_level(),
                        "Sub-stage failed"
                    );
                    self.metrics.stage_failed();
                    report.record(stage.clone(), StageStatus::Failed(err.to_string()));
                    if err.is_task_level() && task_failure.is_none() {
                        task_failure = Some((stage, err));
                    }
                }
                Err(err) => {
                    let message = if err.is_panic() {
                        panic_message(err.into_panic())
                    } else {
                        err.to_string()
                    };
                    error!(image_id = %task.image_id, panic = %message, "Sub-stage panicked");
                    panicked = Some(message);
                }
            }
        }

        if let Some(message) = panicked {
            return Err(ProcessError::StagePanicked(message));
        }

        if let Some((stage, source)) = task_failure {
            return Err(ProcessError::Stage { stage, source });
        }

        if self.options.completion_policy == CompletionPolicy::RequireAll && !report.is_complete() {
            return Err(ProcessError::Incomplete {
                failed: report.failures().count(),
                report,
            });
        }

        self.catalog
            .mark_processed(&task.import_batch_id, &task.image_id)?;

        if task.initial_import {
            let deleted = self
                .bounded("delete source", self.storage.delete(&task.source_key))
                .await;
            if let Err(err) = deleted {
                warn!(source_key = %task.source_key, error = %err, "Failed to remove staged upload");
            }
        }

        info!(
            image_id = %task.image_id,
            failed_stages = report.failures().count(),
            "Import complete"
        );
        Ok(report)
    }

    async fn fetch_source(&self, key: &str) -> Result<Bytes> {
        let fetched = timeout(self.options.operation_timeout, self.storage.get(key))
            .await
            .map_err(|_| ProcessError::Timeout("fetch source"))?;

        let bytes = fetched.map_err(|source| {
            error!(key, error = %source, "Failed to fetch source image");
            ProcessError::Fetch {
                key: key.to_string(),
                source,
            }
        })?;

        if bytes.is_empty() {
            error!(key, "Source image is empty");
            return Err(ProcessError::EmptySource(key.to_string()));
        }

        Ok(bytes)
    }

    /// A redelivered initial import whose image was already completed
    fn finished_earlier(&self, task: &ImportTask) -> Result<bool> {
        if !self.options.dedupe_redelivery || !task.initial_import {
            return Ok(false);
        }
        Ok(self
            .catalog
            .get_image(&task.image_id)?
            .is_some_and(|image| image.is_processed))
    }

    fn skipped_report(&self, task: &ImportTask) -> ProcessReport {
        let mut report = ProcessReport::new(&task.image_id);
        report.record(Stage::Metadata, StageStatus::Skipped);
        report.record(Stage::Original, StageStatus::Skipped);
        for spec in &task.renditions {
            report.record(
                Stage::Rendition {
                    suffix: spec.suffix.clone(),
                },
                StageStatus::Skipped,
            );
        }
        report
    }

    async fn metadata_stage(self, task: Arc<ImportTask>, source: Bytes) -> (Stage, StageResult) {
        (Stage::Metadata, self.extract_metadata(&task, source).await)
    }

    async fn extract_metadata(&self, task: &ImportTask, source: Bytes) -> StageResult {
        let status = if self.options.dedupe_redelivery
            && self.catalog.get_image(&task.image_id)?.is_some()
        {
            StageStatus::Skipped
        } else {
            let scratch = ScratchFile::write(
                &self.options.scratch_dir,
                &format!("{}{}", task.image_id, source_extension(&task.source_key)),
                &source,
            )
            .await?;

            let tags = self
                .bounded("metadata tool", self.extractor.extract(scratch.path()))
                .await?;
            drop(scratch);

            let metadata = populate_metadata(&tags);
            let info = self.blocking("probe source", move || probe(&source)).await?;

            let record = ImageRecord {
                image_id: task.image_id.clone(),
                import_batch_id: task.import_batch_id.clone(),
                original_filename: source_filename(&task.source_key),
                width_pixels: info.width,
                height_pixels: info.height,
                is_processed: false,
                metadata,
            };

            if self.catalog.create_image(&record)? {
                StageStatus::Stored
            } else {
                StageStatus::Skipped
            }
        };

        // Linking is idempotent, so a redelivery repairs a missing link
        if let Some(album_id) = &task.album_id {
            self.catalog.link_image_to_album(album_id, &task.image_id)?;
        }

        Ok(status)
    }

    async fn original_stage(self, task: Arc<ImportTask>, source: Bytes) -> (Stage, StageResult) {
        (Stage::Original, self.store_original(&task, source).await)
    }

    async fn store_original(&self, task: &ImportTask, source: Bytes) -> StageResult {
        let filename = format!("{}{}", task.image_id, source_extension(&task.source_key));
        if self.already_stored(&task.image_id, &filename)? {
            return Ok(StageStatus::Skipped);
        }

        let probe_bytes = source.clone();
        let info = self
            .blocking("probe original", move || probe(&probe_bytes))
            .await?;
        let (width, height) = info.oriented();
        let content_type = sniff_content_type(&source);

        let storage_path = self.media_key(&filename);
        self.bounded(
            "upload original",
            self.storage.put(&storage_path, source, &content_type),
        )
        .await?;

        self.catalog.create_file(&self.file_record(
            task,
            filename,
            storage_path,
            true,
            (width, height),
        ))?;
        Ok(StageStatus::Stored)
    }

    async fn rendition_stage(
        self,
        task: Arc<ImportTask>,
        spec: proto::RenditionSpec,
        source: Bytes,
    ) -> (Stage, StageResult) {
        let stage = Stage::Rendition {
            suffix: spec.suffix.clone(),
        };
        (stage, self.store_rendition(&task, &spec, source).await)
    }

    async fn store_rendition(
        &self,
        task: &ImportTask,
        spec: &proto::RenditionSpec,
        source: Bytes,
    ) -> StageResult {
        let spec = RenditionSpec::try_from(spec)?;
        let filename = spec.filename(&task.image_id);
        if self.already_stored(&task.image_id, &filename)? {
            return Ok(StageStatus::Skipped);
        }

        let render_spec = spec.clone();
        let rendered = self
            .blocking("render", move || render_rendition(&source, &render_spec))
            .await?;
        debug!(
            image_id = %task.image_id,
            suffix = %spec.suffix,
            width = rendered.width,
            height = rendered.height,
            size = rendered.bytes.len(),
            "Rendition encoded"
        );

        let storage_path = self.media_key(&filename);
        self.bounded(
            "upload rendition",
            self.storage
                .put(&storage_path, Bytes::from(rendered.bytes), spec.content_type()),
        )
        .await?;

        self.catalog.create_file(&self.file_record(
            task,
            filename,
            storage_path,
            false,
            (rendered.width, rendered.height),
        ))?;
        Ok(StageStatus::Stored)
    }

    fn already_stored(&self, image_id: &str, filename: &str) -> std::result::Result<bool, StageError> {
        if !self.options.dedupe_redelivery {
            return Ok(false);
        }
        Ok(self.catalog.find_file(image_id, filename)?.is_some())
    }

    fn media_key(&self, filename: &str) -> String {
        format!("{}/{}", self.options.media_prefix, filename)
    }

    fn file_record(
        &self,
        task: &ImportTask,
        filename: String,
        storage_path: String,
        is_original: bool,
        (width, height): (u32, u32),
    ) -> FileRecord {
        FileRecord {
            file_id: Uuid::now_v7().to_string(),
            image_id: task.image_id.clone(),
            import_batch_id: task.import_batch_id.clone(),
            public_url: format!("{}/{}", self.options.public_base_url, storage_path),
            filename,
            storage_path,
            is_original,
            width,
            height,
        }
    }

    /// Run an async external call under the operation timeout
    async fn bounded<T, E, F>(&self, operation: &'static str, call: F) -> std::result::Result<T, StageError>
    where
        F: Future<Output = std::result::Result<T, E>>,
        StageError: From<E>,
    {
        match timeout(self.options.operation_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StageError::Timeout(operation)),
        }
    }

    /// Run codec work on the blocking pool under the operation timeout.
    ///
    /// A panic in the closure is re-raised in the calling sub-stage. A timed
    /// out job keeps running on the blocking pool until it finishes.
    async fn blocking<T, F>(&self, operation: &'static str, work: F) -> std::result::Result<T, StageError>
    where
        F: FnOnce() -> std::result::Result<T, RenderError> + Send + 'static,
        T: Send + 'static,
    {
        match timeout(self.options.operation_timeout, tokio::task::spawn_blocking(work)).await {
            Err(_) => Err(StageError::Timeout(operation)),
            Ok(Err(join)) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Ok(Err(join)) => Err(StageError::Cancelled(join.to_string())),
            Ok(Ok(result)) => Ok(result?),
        }
    }
}

/// Temporary copy of the source for the metadata tool, removed on drop
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    async fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %err, "Scratch file not removed");
        }
    }
}

/// `.jpg` for `uploads/IMG_0001.jpg`, empty when there is no extension
fn source_extension(source_key: &str) -> String {
    Path::new(source_key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn source_filename(source_key: &str) -> String {
    Path::new(source_key)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source_key)
        .to_string()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
