//! Protobuf message types persisted by the task queue.
//!
//! The queue stores every message as a protobuf blob so that the on-disk
//! layout stays stable across releases:
//! - [`ImportTask`] - one image to process, the queue payload
//! - [`RenditionSpec`] - one derived size requested for that image
//! - [`LeaseState`] - lease bookkeeping kept next to each queued task
//! - [`DeadLetterTask`] - a task that exceeded its delivery bound
//!
//! ## Usage
//!
//! ```rust,ignore
//! use darkroom::proto::ImportTask;
//! use prost::Message;
//!
//! let task = ImportTask {
//!     image_id: "0192...".to_string(),
//!     source_key: "uploads/IMG_0001.jpg".to_string(),
//!     initial_import: true,
//!     ..Default::default()
//! };
//!
//! let bytes = task.encode_to_vec();
//! let decoded = ImportTask::decode(&bytes[..])?;
//! ```

/// Per-image import task (queue payload)
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportTask {
    #[prost(string, tag = "1")]
    pub image_id: String,
    #[prost(string, tag = "2")]
    pub import_batch_id: String,
    #[prost(string, optional, tag = "3")]
    pub album_id: Option<String>,
    #[prost(string, tag = "4")]
    pub source_key: String,
    #[prost(bool, tag = "5")]
    pub initial_import: bool,
    #[prost(message, repeated, tag = "6")]
    pub renditions: Vec<RenditionSpec>,
}

/// Requested rendition, as carried inside an [`ImportTask`]
///
/// `format` holds the lowercase format name (`jpeg`, `png`, `webp`, `avif`).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RenditionSpec {
    #[prost(uint32, tag = "1")]
    pub long_edge: u32,
    #[prost(uint32, tag = "2")]
    pub quality: u32,
    #[prost(string, tag = "3")]
    pub suffix: String,
    #[prost(string, tag = "4")]
    pub format: String,
    #[prost(string, tag = "5")]
    pub extension: String,
    #[prost(string, tag = "6")]
    pub content_type: String,
}

/// Lease bookkeeping for one queued task
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LeaseState {
    #[prost(string, tag = "1")]
    pub token: String,
    #[prost(uint64, tag = "2")]
    pub expires_at_ms: u64,
    #[prost(uint32, tag = "3")]
    pub deliveries: u32,
}

/// Task that was taken out of circulation
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeadLetterTask {
    #[prost(message, optional, tag = "1")]
    pub task: Option<ImportTask>,
    #[prost(string, tag = "2")]
    pub failure_code: String,
    #[prost(string, tag = "3")]
    pub failure_message: String,
    #[prost(uint32, tag = "4")]
    pub deliveries: u32,
    #[prost(uint64, tag = "5")]
    pub failed_at_ms: u64,
}
