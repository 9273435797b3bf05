use crate::imaging::{RenditionSpec, default_renditions};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Renditions produced for every imported image
    #[serde(default = "default_renditions")]
    pub renditions: Vec<RenditionSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
            processor: ProcessorConfig::default(),
            renditions: default_renditions(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Root for the queue and catalog databases
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_max_names_per_batch")]
    pub max_names_per_batch: usize,
    #[serde(default = "default_max_name_bytes")]
    pub max_name_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            api: ApiLimits::default(),
        }
    }
}

impl ServerConfig {
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("queue")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog")
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_names_per_batch: default_max_names_per_batch(),
            max_name_bytes: default_max_name_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024 // 1 MB
}

fn default_max_names_per_batch() -> usize {
    1000
}

fn default_max_name_bytes() -> usize {
    255
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Memory,
    #[default]
    Local,
    S3,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Directory backing the `local` provider
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
    /// Staging area clients upload into before submitting an import
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,
    /// Where originals and renditions are stored
    #[serde(default = "default_media_prefix")]
    pub media_prefix: String,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            bucket: default_bucket(),
            root: default_storage_root(),
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
            upload_prefix: default_upload_prefix(),
            media_prefix: default_media_prefix(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_bucket() -> String {
    "darkroom-media".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/objects")
}

fn default_upload_prefix() -> String {
    "uploads".to_string()
}

fn default_media_prefix() -> String {
    "media".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Task queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_lease_timeout_ms")]
    pub lease_timeout_ms: u64,
    /// Dead-letter a task after this many deliveries; unset retries forever
    #[serde(default)]
    pub max_deliveries: Option<u32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_timeout_ms: default_lease_timeout_ms(),
            max_deliveries: None,
        }
    }
}

impl QueueConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }
}

fn default_lease_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Pause after each task and after an empty poll
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,
    /// How long shutdown waits for in-flight tasks
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            idle_delay_ms: default_idle_delay_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_idle_delay_ms() -> u64 {
    1000
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}

/// Whether a task with failed sub-stages still counts as processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Mark processed once every sub-stage has finished, failed or not
    #[default]
    BestEffort,
    /// Leave the task for redelivery when any sub-stage failed
    RequireAll,
}

/// Image processor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default)]
    pub completion_policy: CompletionPolicy,
    /// Skip writes that a previous delivery of the same task already made
    #[serde(default = "default_dedupe_redelivery")]
    pub dedupe_redelivery: bool,
    #[serde(default = "default_exiftool_path")]
    pub exiftool_path: PathBuf,
    /// Scratch files for the metadata tool; the system temp dir when unset
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout_ms(),
            completion_policy: CompletionPolicy::default(),
            dedupe_redelivery: default_dedupe_redelivery(),
            exiftool_path: default_exiftool_path(),
            scratch_dir: None,
        }
    }
}

impl ProcessorConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

fn default_operation_timeout_ms() -> u64 {
    120_000
}

fn default_dedupe_redelivery() -> bool {
    true
}

fn default_exiftool_path() -> PathBuf {
    PathBuf::from("exiftool")
}
