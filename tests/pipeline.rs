use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};
use tempfile::TempDir;

use darkroom::catalog::{Album, Catalog, FjallCatalog, ImportTaskRow};
use darkroom::config::{CompletionPolicy, WorkerConfig};
use darkroom::exif::{ExtractError, TagExtractor, TagMap};
use darkroom::imaging::{OutputFormat, RenditionSpec, default_renditions};
use darkroom::import::{BatchSubmitter, StatusTracker};
use darkroom::observability::Metrics;
use darkroom::processor::{
    ImageProcessor, ProcessError, ProcessorOptions, Stage, StageError, StageStatus,
};
use darkroom::proto::{self, ImportTask};
use darkroom::queue::{FjallQueue, QueueOptions};
use darkroom::storage::StorageClient;
use darkroom::worker::WorkerPool;

/// Returns canned tags and counts calls per image id.
/// Panics for the configured image id, fails to start when `unreachable`.
#[derive(Default)]
struct FakeExtractor {
    calls: AtomicUsize,
    poisoned: Option<String>,
    panicked: AtomicUsize,
    unreachable: bool,
}

#[async_trait]
impl TagExtractor for FakeExtractor {
    async fn extract(&self, path: &Path) -> Result<TagMap, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "scratch file must exist while extracting");

        if self.unreachable {
            return Err(ExtractError::Spawn {
                binary: "exiftool".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let image_id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if self.poisoned.as_deref() == Some(image_id) {
            self.panicked.fetch_add(1, Ordering::SeqCst);
            panic!("malformed maker notes in {image_id}");
        }

        Ok(TagMap::from([
            ("Make".to_string(), "FUJIFILM".to_string()),
            ("Model".to_string(), "X-T4".to_string()),
            ("ISO".to_string(), "400".to_string()),
            ("FNumber".to_string(), "not-a-number".to_string()),
        ]))
    }
}

struct Harness {
    dir: TempDir,
    queue: Arc<FjallQueue>,
    catalog: Arc<FjallCatalog>,
    storage: Arc<StorageClient>,
    extractor: Arc<FakeExtractor>,
    metrics: Arc<Metrics>,
}

impl Harness {
    fn new() -> Self {
        Self::with_extractor(FakeExtractor::default(), Duration::from_secs(60))
    }

    fn with_extractor(extractor: FakeExtractor, lease_timeout: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(
            FjallQueue::open(
                dir.path().join("queue"),
                QueueOptions {
                    lease_timeout,
                    max_deliveries: None,
                },
            )
            .unwrap(),
        );
        let catalog = Arc::new(FjallCatalog::open(dir.path().join("catalog")).unwrap());

        Self {
            dir,
            queue,
            catalog,
            storage: Arc::new(StorageClient::in_memory()),
            extractor: Arc::new(extractor),
            metrics: Arc::new(Metrics::new()),
        }
    }

    fn options(&self) -> ProcessorOptions {
        ProcessorOptions {
            operation_timeout: Duration::from_secs(30),
            scratch_dir: self.dir.path().join("scratch"),
            media_prefix: "media".to_string(),
            public_base_url: "http://cdn.test".to_string(),
            ..Default::default()
        }
    }

    fn processor(&self, options: ProcessorOptions) -> ImageProcessor {
        ImageProcessor::builder()
            .storage(self.storage.clone())
            .catalog(self.catalog.clone())
            .extractor(self.extractor.clone())
            .options(options)
            .metrics(self.metrics.clone())
            .build()
    }

    fn submitter(&self, renditions: Vec<RenditionSpec>) -> BatchSubmitter {
        BatchSubmitter::builder()
            .queue(self.queue.clone())
            .catalog(self.catalog.clone())
            .renditions(renditions)
            .upload_prefix("uploads")
            .metrics(self.metrics.clone())
            .build()
    }

    async fn stage_upload(&self, name: &str, bytes: Vec<u8>) {
        self.storage
            .put(&format!("uploads/{name}"), Bytes::from(bytes), "image/jpeg")
            .await
            .unwrap();
    }

    /// Task plus matching status row, as the submitter would create them
    fn task(&self, image_id: &str, name: &str, renditions: &[RenditionSpec]) -> ImportTask {
        self.catalog
            .create_task_row(&ImportTaskRow {
                image_id: image_id.to_string(),
                import_batch_id: "batch-1".to_string(),
                filename: name.to_string(),
                is_processed: false,
            })
            .unwrap();

        ImportTask {
            image_id: image_id.to_string(),
            import_batch_id: "batch-1".to_string(),
            album_id: None,
            source_key: format!("uploads/{name}"),
            initial_import: true,
            renditions: renditions.iter().map(proto::RenditionSpec::from).collect(),
        }
    }
}

fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Insert an EXIF APP1 segment carrying only an Orientation tag after SOI
fn with_orientation(jpeg: Vec<u8>, orientation: u16) -> Vec<u8> {
    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
    app1.extend_from_slice(&[0x00, 0x01]);
    app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&orientation.to_be_bytes());
    app1.extend_from_slice(&[0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn worker_config(concurrency: usize) -> WorkerConfig {
    WorkerConfig {
        concurrency,
        idle_delay_ms: 20,
        drain_timeout_ms: 5_000,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn test_batch_of_two_with_default_renditions() {
    let harness = Harness::new();
    harness.stage_upload("a.jpg", test_jpeg(320, 240)).await;
    harness.stage_upload("b.jpg", test_jpeg(240, 320)).await;

    let submitter = harness.submitter(default_renditions());
    let names = vec!["a.jpg".to_string(), "b.jpg".to_string()];
    let batch_id = submitter.submit(&names, None).unwrap();

    let tracker = StatusTracker::new(harness.catalog.clone());
    assert!(!tracker.batch_status(&batch_id).unwrap().all_processed);

    let pool = WorkerPool::spawn(
        &worker_config(2),
        harness.queue.clone(),
        harness.processor(harness.options()),
        harness.metrics.clone(),
    );
    wait_until(|| tracker.batch_status(&batch_id).unwrap().all_processed).await;
    pool.shutdown().await;

    let stats = harness.catalog.stats().unwrap();
    assert_eq!(stats.image_count, 2);
    assert_eq!(stats.file_count, 12);

    let rows = harness.catalog.list_task_rows(&batch_id).unwrap();
    for row in &rows {
        let image = harness.catalog.get_image(&row.image_id).unwrap().unwrap();
        assert!(image.is_processed);
        assert_eq!(image.original_filename, row.filename);
        assert_eq!(image.metadata.make.as_deref(), Some("FUJIFILM"));
        assert_eq!(image.metadata.camera_model.as_deref(), Some("X-T4"));
        assert_eq!(image.metadata.iso, Some(400.0));
        assert_eq!(image.metadata.f_number, None);

        let files = harness.catalog.list_files(&row.image_id).unwrap();
        assert_eq!(files.iter().filter(|f| f.is_original).count(), 1);
        assert_eq!(files.iter().filter(|f| !f.is_original).count(), 5);
        for file in &files {
            assert!(harness.storage.exists(&file.storage_path).await.unwrap());
            assert_eq!(file.public_url, format!("http://cdn.test/{}", file.storage_path));
        }
    }

    let status = tracker.batch_status(&batch_id).unwrap();
    assert!(status.statuses.iter().all(|s| s.url.as_deref().is_some_and(|u| u.ends_with("_thumb.webp"))));

    assert!(!harness.storage.exists("uploads/a.jpg").await.unwrap());
    assert!(!harness.storage.exists("uploads/b.jpg").await.unwrap());
    assert_eq!(harness.queue.pending().unwrap(), 0);

    let metrics = harness.metrics.snapshot();
    assert_eq!(metrics.batches_submitted, 1);
    assert_eq!(metrics.tasks_completed, 2);
    assert_eq!(metrics.tasks_failed, 0);
}

#[tokio::test]
async fn test_rendition_never_upscales() {
    let harness = Harness::new();
    harness.stage_upload("wide.jpg", test_jpeg(1200, 800)).await;

    let specs = vec![RenditionSpec::new(2560, 70, "_xlarge", OutputFormat::Jpeg)];
    let task = harness.task("img-wide", "wide.jpg", &specs);
    let report = harness.processor(harness.options()).process(&task).await.unwrap();
    assert!(report.is_complete());

    let rendition = harness
        .catalog
        .find_file("img-wide", "img-wide_xlarge.jpg")
        .unwrap()
        .unwrap();
    assert_eq!((rendition.width, rendition.height), (1200, 800));

    let bytes = harness.storage.get(&rendition.storage_path).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1200, 800));
    assert_eq!(
        harness.storage.content_type(&rendition.storage_path).await.unwrap().as_deref(),
        Some("image/jpeg")
    );

    let original = harness.catalog.find_file("img-wide", "img-wide.jpg").unwrap().unwrap();
    assert!(original.is_original);
    assert_eq!(original.storage_path, "media/img-wide.jpg");
}

#[tokio::test]
async fn test_missing_source_aborts_before_any_record() {
    let harness = Harness::new();
    let task = harness.task("img-gone", "gone.jpg", &default_renditions());

    let err = harness.processor(harness.options()).process(&task).await.unwrap_err();
    assert!(matches!(err, ProcessError::Fetch { .. }));

    assert!(harness.catalog.get_image("img-gone").unwrap().is_none());
    assert!(harness.catalog.list_files("img-gone").unwrap().is_empty());
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_source_is_rejected() {
    let harness = Harness::new();
    harness.stage_upload("empty.jpg", Vec::new()).await;
    let task = harness.task("img-empty", "empty.jpg", &default_renditions());

    let err = harness.processor(harness.options()).process(&task).await.unwrap_err();
    assert!(matches!(err, ProcessError::EmptySource(_)));
    assert!(harness.catalog.list_files("img-empty").unwrap().is_empty());
}

#[tokio::test]
async fn test_redelivery_without_dedupe_duplicates_files() {
    let harness = Harness::new();
    let specs = vec![RenditionSpec::new(64, 80, "_thumb", OutputFormat::Jpeg)];
    let task = harness.task("img-dup", "dup.jpg", &specs);
    let processor = harness.processor(ProcessorOptions {
        dedupe_redelivery: false,
        ..harness.options()
    });

    harness.stage_upload("dup.jpg", test_jpeg(128, 96)).await;
    processor.process(&task).await.unwrap();

    // The first delivery crashed before its ack, so the upload is staged again
    harness.stage_upload("dup.jpg", test_jpeg(128, 96)).await;
    let report = processor.process(&task).await.unwrap();

    assert_eq!(report.status_of(&Stage::Metadata), Some(&StageStatus::Skipped));
    assert_eq!(harness.catalog.list_files("img-dup").unwrap().len(), 4);
    assert_eq!(harness.catalog.stats().unwrap().image_count, 1);
}

#[tokio::test]
async fn test_redelivery_with_dedupe_skips_existing_files() {
    let harness = Harness::new();
    let specs = vec![RenditionSpec::new(64, 80, "_thumb", OutputFormat::Jpeg)];
    let task = harness.task("img-once", "once.jpg", &specs);
    let processor = harness.processor(harness.options());

    harness.stage_upload("once.jpg", test_jpeg(128, 96)).await;
    processor.process(&task).await.unwrap();
    harness.stage_upload("once.jpg", test_jpeg(128, 96)).await;
    let report = processor.process(&task).await.unwrap();

    assert!(
        report
            .stages
            .iter()
            .all(|outcome| outcome.status == StageStatus::Skipped)
    );
    assert_eq!(harness.catalog.list_files("img-once").unwrap().len(), 2);
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_completion_policy_on_stage_failure() {
    let harness = Harness::new();
    let mut specs = vec![RenditionSpec::new(64, 80, "_thumb", OutputFormat::Jpeg)];
    specs.push(RenditionSpec::new(32, 80, "_tiny", OutputFormat::Jpeg));
    let mut task = harness.task("img-partial", "partial.jpg", &specs);
    task.renditions[1].format = "gif".to_string();

    harness.stage_upload("partial.jpg", test_jpeg(128, 96)).await;
    let strict = harness.processor(ProcessorOptions {
        completion_policy: CompletionPolicy::RequireAll,
        ..harness.options()
    });
    let err = strict.process(&task).await.unwrap_err();
    match err {
        ProcessError::Incomplete { failed, report } => {
            assert_eq!(failed, 1);
            let failed_stage = Stage::Rendition {
                suffix: "_tiny".to_string(),
            };
            assert!(matches!(report.status_of(&failed_stage), Some(StageStatus::Failed(_))));
        }
        other => panic!("expected Incomplete, got {other:?}"),
    }
    assert!(!harness.catalog.get_image("img-partial").unwrap().unwrap().is_processed);
    assert!(harness.storage.exists("uploads/partial.jpg").await.unwrap());

    let lenient = harness.processor(harness.options());
    let report = lenient.process(&task).await.unwrap();
    assert!(!report.is_complete());
    assert!(harness.catalog.get_image("img-partial").unwrap().unwrap().is_processed);
    assert!(!harness.storage.exists("uploads/partial.jpg").await.unwrap());
    assert_eq!(harness.metrics.snapshot().stages_failed, 2);
}

#[tokio::test]
async fn test_unreachable_metadata_tool_leaves_task_for_redelivery() {
    let harness = Harness::with_extractor(
        FakeExtractor {
            unreachable: true,
            ..Default::default()
        },
        Duration::from_secs(60),
    );
    let specs = vec![RenditionSpec::new(64, 80, "_thumb", OutputFormat::Jpeg)];
    let task = harness.task("img-notool", "notool.jpg", &specs);
    harness.stage_upload("notool.jpg", test_jpeg(128, 96)).await;

    let err = harness.processor(harness.options()).process(&task).await.unwrap_err();
    match err {
        ProcessError::Stage { stage, source } => {
            assert_eq!(stage, Stage::Metadata);
            assert!(matches!(source, StageError::Extract(ExtractError::Spawn { .. })));
        }
        other => panic!("expected a sub-stage failure, got {other:?}"),
    }

    // Siblings still ran to completion
    assert!(harness.catalog.find_file("img-notool", "img-notool_thumb.jpg").unwrap().is_some());

    assert!(harness.catalog.get_image("img-notool").unwrap().is_none());
    let rows = harness.catalog.list_task_rows("batch-1").unwrap();
    assert!(rows.iter().all(|row| !row.is_processed));
    assert!(harness.storage.exists("uploads/notool.jpg").await.unwrap());

    // Once the tool is back, the redelivery completes without duplicates
    let recovered = ImageProcessor::builder()
        .storage(harness.storage.clone())
        .catalog(harness.catalog.clone())
        .extractor(Arc::new(FakeExtractor::default()))
        .options(harness.options())
        .build();
    let report = recovered.process(&task).await.unwrap();
    assert_eq!(report.status_of(&Stage::Metadata), Some(&StageStatus::Stored));
    assert!(harness.catalog.get_image("img-notool").unwrap().unwrap().is_processed);
    assert_eq!(harness.catalog.list_files("img-notool").unwrap().len(), 2);
}

#[tokio::test]
async fn test_redelivery_after_cleanup_is_acknowledged() {
    let harness = Harness::new();
    let specs = vec![RenditionSpec::new(64, 80, "_thumb", OutputFormat::Jpeg)];
    let task = harness.task("img-late", "late.jpg", &specs);
    let processor = harness.processor(harness.options());

    harness.stage_upload("late.jpg", test_jpeg(128, 96)).await;
    processor.process(&task).await.unwrap();
    assert!(!harness.storage.exists("uploads/late.jpg").await.unwrap());

    // The ack was lost, so the task comes back after its upload is gone
    let report = processor.process(&task).await.unwrap();
    assert_eq!(report.stages.len(), 3);
    assert!(
        report
            .stages
            .iter()
            .all(|outcome| outcome.status == StageStatus::Skipped)
    );
    assert_eq!(harness.catalog.list_files("img-late").unwrap().len(), 2);
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);

    // Without dedupe the missing upload is still an error
    let plain = harness.processor(ProcessorOptions {
        dedupe_redelivery: false,
        ..harness.options()
    });
    assert!(matches!(
        plain.process(&task).await.unwrap_err(),
        ProcessError::Fetch { .. }
    ));
}

#[tokio::test]
async fn test_rotated_source_records_oriented_dimensions() {
    let harness = Harness::new();
    // Stored landscape, displayed portrait
    harness
        .stage_upload("rotated.jpg", with_orientation(test_jpeg(400, 300), 6))
        .await;

    let specs = vec![RenditionSpec::new(200, 80, "_thumb", OutputFormat::Jpeg)];
    let task = harness.task("img-rot", "rotated.jpg", &specs);
    harness.processor(harness.options()).process(&task).await.unwrap();

    let original = harness.catalog.find_file("img-rot", "img-rot.jpg").unwrap().unwrap();
    assert_eq!((original.width, original.height), (300, 400));

    let thumb = harness.catalog.find_file("img-rot", "img-rot_thumb.jpg").unwrap().unwrap();
    assert_eq!((thumb.width, thumb.height), (150, 200));

    let bytes = harness.storage.get(&thumb.storage_path).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (150, 200));
}

#[tokio::test]
async fn test_album_link_on_import() {
    let harness = Harness::new();
    harness
        .catalog
        .create_album(&Album {
            album_id: "album-1".to_string(),
            slug: "iceland".to_string(),
            name: "Iceland".to_string(),
            description: String::new(),
            created_at: Utc::now(),
        })
        .unwrap();

    harness.stage_upload("ice.jpg", test_jpeg(96, 64)).await;
    let mut task = harness.task("img-ice", "ice.jpg", &[]);
    task.album_id = Some("album-1".to_string());

    harness.processor(harness.options()).process(&task).await.unwrap();
    assert_eq!(
        harness.catalog.list_album_images("album-1").unwrap(),
        vec!["img-ice".to_string()]
    );
}

#[tokio::test]
async fn test_reprocess_runs_renditions_only() {
    let harness = Harness::new();
    harness.stage_upload("re.jpg", test_jpeg(128, 96)).await;
    let first = harness.task("img-re", "re.jpg", &[]);
    let processor = harness.processor(harness.options());
    processor.process(&first).await.unwrap();

    harness.stage_upload("re.jpg", test_jpeg(128, 96)).await;
    let specs = vec![RenditionSpec::new(48, 80, "_icon", OutputFormat::Png)];
    let mut second = harness.task("img-re", "re.jpg", &specs);
    second.initial_import = false;

    let report = processor.process(&second).await.unwrap();
    assert_eq!(report.stages.len(), 1);
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
    let icon = harness.catalog.find_file("img-re", "img-re_icon.png").unwrap().unwrap();
    assert_eq!((icon.width, icon.height), (48, 36));
    // Only an initial import removes the staged upload
    assert!(harness.storage.exists("uploads/re.jpg").await.unwrap());
}

#[tokio::test]
async fn test_panicking_task_is_redelivered_while_pool_continues() {
    let harness = Harness::with_extractor(
        FakeExtractor {
            poisoned: Some("img-bad".to_string()),
            ..Default::default()
        },
        Duration::from_millis(300),
    );
    harness.stage_upload("bad.jpg", test_jpeg(64, 64)).await;
    harness.stage_upload("good.jpg", test_jpeg(64, 64)).await;

    let bad = harness.task("img-bad", "bad.jpg", &[]);
    let good = harness.task("img-good", "good.jpg", &[]);
    harness.queue.enqueue(&bad).unwrap();
    harness.queue.enqueue(&good).unwrap();

    let pool = WorkerPool::spawn(
        &worker_config(1),
        harness.queue.clone(),
        harness.processor(harness.options()),
        harness.metrics.clone(),
    );

    let catalog = harness.catalog.clone();
    wait_until(|| {
        catalog
            .get_image("img-good")
            .unwrap()
            .is_some_and(|image| image.is_processed)
    })
    .await;

    let extractor = harness.extractor.clone();
    wait_until(|| extractor.panicked.load(Ordering::SeqCst) >= 2).await;
    pool.shutdown().await;

    assert_eq!(harness.queue.pending().unwrap(), 1);
    assert!(harness.catalog.get_image("img-bad").unwrap().is_none());

    let metrics = harness.metrics.snapshot();
    assert_eq!(metrics.tasks_completed, 1);
    assert!(metrics.tasks_failed >= 2);
}

#[tokio::test]
async fn test_worker_idles_between_tasks() {
    let harness = Harness::new();
    harness.stage_upload("one.jpg", test_jpeg(32, 32)).await;
    harness.stage_upload("two.jpg", test_jpeg(32, 32)).await;
    harness.queue.enqueue(&harness.task("img-one", "one.jpg", &[])).unwrap();
    harness.queue.enqueue(&harness.task("img-two", "two.jpg", &[])).unwrap();

    let idle_delay = Duration::from_millis(400);
    let started = tokio::time::Instant::now();
    let pool = WorkerPool::spawn(
        &WorkerConfig {
            idle_delay_ms: idle_delay.as_millis() as u64,
            ..worker_config(1)
        },
        harness.queue.clone(),
        harness.processor(harness.options()),
        harness.metrics.clone(),
    );

    let queue = harness.queue.clone();
    wait_until(|| queue.pending().unwrap() == 0).await;
    assert!(started.elapsed() >= idle_delay);
    pool.shutdown().await;

    assert_eq!(harness.metrics.snapshot().tasks_completed, 2);
}

#[tokio::test]
async fn test_shutdown_with_idle_workers() {
    let harness = Harness::new();
    let pool = WorkerPool::spawn(
        &worker_config(3),
        harness.queue.clone(),
        harness.processor(harness.options()),
        harness.metrics.clone(),
    );
    assert_eq!(pool.len(), 3);

    tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
        .await
        .expect("idle workers stop promptly");
}
