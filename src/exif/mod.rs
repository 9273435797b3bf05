//! Capture metadata extraction.
//!
//! The external tool produces a flat tag → string map
//! ([`TagExtractor`]), and [`populate_metadata`] turns it into typed
//! [`ImageMetadata`](crate::catalog::ImageMetadata) through the static
//! [`FIELD_MAPPINGS`] table.

pub mod mapping;
pub mod tool;

pub use mapping::{FIELD_MAPPINGS, FieldMapping, FieldSetter, TagMap, populate_metadata};
pub use tool::{ExifTool, TagExtractor, parse_json_output};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("Unreadable tool output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Metadata tool reported no files")]
    NoMetadata,
}

pub type Result<T> = std::result::Result<T, ExtractError>;
