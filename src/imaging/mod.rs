//! Rendition rendering.
//!
//! `render_rendition` is a pure transform from source bytes and a
//! [`RenditionSpec`] to encoded bytes. Dimension arithmetic lives in
//! [`dimensions`] so it can be tested without images.

pub mod dimensions;
pub mod format;
pub mod render;

pub use dimensions::{is_quarter_turn, long_edge, oriented_dimensions, target_dimensions};
pub use format::{OutputFormat, RenditionSpec, default_renditions};
pub use render::{Rendered, SourceInfo, probe, render_rendition, sniff_content_type};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source image is empty")]
    EmptySource,

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Quality {0} is outside 0..=100")]
    InvalidQuality(u32),

    #[error("Long edge must be at least one pixel")]
    InvalidLongEdge,

    #[error("Encoder failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
