//! Per-image import pipeline.
//!
//! [`ImageProcessor::process`] fetches the staged upload once and fans out
//! into concurrent sub-stages:
//!
//! - metadata: run the tag extractor, write the image record, link the album
//! - original: copy the source under the media prefix with its sniffed type
//! - one rendition per requested [`RenditionSpec`](crate::imaging::RenditionSpec)
//!
//! Metadata and original only run on an initial import. When every sub-stage
//! has been joined the image is marked processed and the staged upload is
//! removed. Each sub-stage reports into a [`ProcessReport`].

pub mod error;
pub mod pipeline;
pub mod report;

pub use crate::config::CompletionPolicy;
pub use error::{ProcessError, Result, StageError};
pub use pipeline::{ImageProcessor, ProcessorOptions};
pub use report::{ProcessReport, Stage, StageOutcome, StageStatus};
