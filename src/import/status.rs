use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{Catalog, FileRecord, Result};

/// Files at or below this width are never picked as the preview
const PREVIEW_MIN_WIDTH: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub is_processed: bool,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub all_processed: bool,
    pub statuses: Vec<FileStatus>,
}

/// Read-only view over task rows for polling clients
#[derive(Clone)]
pub struct StatusTracker {
    catalog: Arc<dyn Catalog>,
}

impl StatusTracker {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Report progress of a batch. An unknown batch has no rows and is
    /// reported as not processed.
    pub fn batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        let rows = self.catalog.list_task_rows(batch_id)?;
        let all_processed = !rows.is_empty() && rows.iter().all(|row| row.is_processed);

        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            let url = if row.is_processed {
                let files = self.catalog.list_files(&row.image_id)?;
                preview_file(&files).map(|file| file.public_url.clone())
            } else {
                None
            };
            statuses.push(FileStatus {
                is_processed: row.is_processed,
                filename: row.filename,
                url,
            });
        }

        debug!(batch_id, all_processed, files = statuses.len(), "Batch status resolved");
        Ok(BatchStatus {
            batch_id: batch_id.to_string(),
            all_processed,
            statuses,
        })
    }
}

/// Narrowest rendition wider than the preview floor, else the widest file.
///
/// Originals are only considered when no rendition qualifies.
fn preview_file(files: &[FileRecord]) -> Option<&FileRecord> {
    narrowest_above_floor(files.iter().filter(|file| !file.is_original))
        .or_else(|| narrowest_above_floor(files.iter()))
        .or_else(|| files.iter().max_by_key(|file| file.width))
}

fn narrowest_above_floor<'a>(files: impl Iterator<Item = &'a FileRecord>) -> Option<&'a FileRecord> {
    files
        .filter(|file| file.width > PREVIEW_MIN_WIDTH)
        .min_by_key(|file| file.width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FjallCatalog, ImportTaskRow};
    use tempfile::TempDir;

    fn file(image_id: &str, filename: &str, width: u32, is_original: bool) -> FileRecord {
        FileRecord {
            file_id: format!("{image_id}-{filename}"),
            image_id: image_id.to_string(),
            import_batch_id: "batch".to_string(),
            filename: filename.to_string(),
            storage_path: format!("media/{filename}"),
            public_url: format!("http://cdn/media/{filename}"),
            is_original,
            width,
            height: width,
        }
    }

    fn row(image_id: &str, is_processed: bool) -> ImportTaskRow {
        ImportTaskRow {
            image_id: image_id.to_string(),
            import_batch_id: "batch".to_string(),
            filename: format!("{image_id}.jpg"),
            is_processed,
        }
    }

    #[test]
    fn test_preview_prefers_narrowest_above_floor() {
        let files = vec![
            file("i", "orig.jpg", 4000, true),
            file("i", "thumb.webp", 100, false),
            file("i", "small.webp", 600, false),
            file("i", "large.webp", 1920, false),
        ];
        assert_eq!(preview_file(&files).unwrap().filename, "small.webp");
    }

    #[test]
    fn test_preview_falls_back_to_widest() {
        let files = vec![file("i", "a.webp", 80, false), file("i", "b.webp", 90, false)];
        assert_eq!(preview_file(&files).unwrap().filename, "b.webp");
        assert!(preview_file(&[]).is_none());
    }

    #[test]
    fn test_preview_uses_original_when_no_rendition_qualifies() {
        let files = vec![file("i", "orig.jpg", 640, true), file("i", "tiny.webp", 50, false)];
        assert_eq!(preview_file(&files).unwrap().filename, "orig.jpg");
    }

    #[test]
    fn test_batch_status() {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(FjallCatalog::open(dir.path()).unwrap());
        let tracker = StatusTracker::new(catalog.clone());

        let empty = tracker.batch_status("batch").unwrap();
        assert!(!empty.all_processed);
        assert!(empty.statuses.is_empty());

        catalog.create_task_row(&row("img-1", true)).unwrap();
        catalog.create_task_row(&row("img-2", false)).unwrap();
        catalog.create_file(&file("img-1", "img-1_small.webp", 600, false)).unwrap();

        let status = tracker.batch_status("batch").unwrap();
        assert!(!status.all_processed);
        let done = status.statuses.iter().find(|s| s.filename == "img-1.jpg").unwrap();
        assert_eq!(done.url.as_deref(), Some("http://cdn/media/img-1_small.webp"));
        let pending = status.statuses.iter().find(|s| s.filename == "img-2.jpg").unwrap();
        assert_eq!(pending.url, None);

        catalog.mark_processed("batch", "img-2").unwrap();
        assert!(tracker.batch_status("batch").unwrap().all_processed);
    }
}
