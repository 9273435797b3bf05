use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::mapping::TagMap;
use super::{ExtractError, Result};

/// Reads embedded metadata tags from a file on local disk
#[async_trait]
pub trait TagExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<TagMap>;
}

/// Runs `exiftool -json <path>` and flattens its output
#[derive(Debug, Clone)]
pub struct ExifTool {
    binary: PathBuf,
}

impl ExifTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

#[async_trait]
impl TagExtractor for ExifTool {
    async fn extract(&self, path: &Path) -> Result<TagMap> {
        let output = Command::new(&self.binary)
            .arg("-json")
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractError::ToolFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let tags = parse_json_output(&output.stdout)?;
        debug!(path = %path.display(), tags = tags.len(), "Extracted metadata tags");
        Ok(tags)
    }
}

/// Flatten exiftool's JSON output (an array with one object per file).
///
/// Numbers and booleans are printed, arrays joined with `, `; nulls and
/// nested objects are dropped.
pub fn parse_json_output(stdout: &[u8]) -> Result<TagMap> {
    let files: Vec<Map<String, Value>> = serde_json::from_slice(stdout)?;
    let first = files.into_iter().next().ok_or(ExtractError::NoMetadata)?;

    Ok(first
        .into_iter()
        .filter_map(|(tag, value)| stringify(value).map(|v| (tag, v)))
        .collect())
}

fn stringify(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(stringify)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Null | Value::Object(_) => None,
    }
}
