//! Request and response bodies for the import endpoints.
//!
//! `POST /imports` accepts an [`ImportRequest`] naming files already staged
//! under the upload prefix:
//!
//! ```json
//! {
//!   "names": ["IMG_0001.jpg", "IMG_0002.jpg"],
//!   "album_id": "0192f7c4-..."
//! }
//! ```
//!
//! and answers `202 Accepted` with an [`ImportAccepted`]. Progress is polled on
//! `GET /imports/{batch_id}`, which returns a
//! [`BatchStatus`](crate::import::BatchStatus).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub names: Vec<String>,
    #[serde(default)]
    pub album_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAccepted {
    pub import_batch_id: String,
    pub file_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub pending_tasks: Option<usize>,
    pub version: String,
}
