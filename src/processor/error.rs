use thiserror::Error;

use super::report::{ProcessReport, Stage};
use crate::catalog::CatalogError;
use crate::exif::ExtractError;
use crate::imaging::RenderError;
use crate::storage::StorageError;

/// Task-level failure; the task is left unacknowledged
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to fetch source {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Source {0} is empty")]
    EmptySource(String),

    #[error("Timed out: {0}")]
    Timeout(&'static str),

    #[error("Sub-stage panicked: {0}")]
    StagePanicked(String),

    /// A sub-stage hit an error that a later delivery may not hit
    #[error("Sub-stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("{failed} sub-stage(s) failed")]
    Incomplete { failed: usize, report: ProcessReport },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure of one sub-stage; siblings are unaffected
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Metadata extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out: {0}")]
    Timeout(&'static str),

    #[error("Blocking work cancelled: {0}")]
    Cancelled(String),
}

impl StageError {
    /// Whether the failure is tied to this delivery rather than to the image.
    ///
    /// Unreachable stores or tools, catalog writes and timeouts fail the whole
    /// task so it is redelivered. Codec failures only skip their sub-stage.
    pub fn is_task_level(&self) -> bool {
        !matches!(self, StageError::Render(_))
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;
