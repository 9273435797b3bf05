//! Client-facing import operations: submitting a batch of uploads and
//! polling its progress.

pub mod status;
pub mod submit;

pub use status::{BatchStatus, FileStatus, StatusTracker};
pub use submit::{BatchSubmitter, SubmitError};
