/// Fjall-backed metadata catalog for imported images
///
/// The catalog records everything the import pipeline produces and everything
/// the status endpoint reads back:
///
/// - Image records (capture metadata, dimensions, processed flag)
/// - File records (one per stored original or rendition, append-only)
/// - Task-status rows (one per submitted file, grouped by batch)
/// - Albums and album membership
///
/// Each import task owns a distinct image id, so concurrent workers write
/// disjoint keys. Read-modify-write sequences inside one store are serialized.
///
/// ## Usage
///
/// ```rust,ignore
/// use darkroom::catalog::{Catalog, FjallCatalog};
///
/// let catalog = FjallCatalog::open("data/catalog")?;
/// catalog.create_task_row(&row)?;
/// let rows = catalog.list_task_rows(&batch_id)?;
/// ```

pub mod error;
pub mod models;
pub mod partitions;
pub mod store;

pub use error::{CatalogError, Result};
pub use models::{Album, FileRecord, ImageMetadata, ImageRecord, ImportTaskRow};
pub use store::{CatalogStats, FjallCatalog};

/// Metadata store operations used by the pipeline and the status tracker
pub trait Catalog: Send + Sync {
    /// Insert an image record unless one with the same id exists.
    /// Returns whether a new record was written.
    fn create_image(&self, record: &ImageRecord) -> Result<bool>;

    fn get_image(&self, image_id: &str) -> Result<Option<ImageRecord>>;

    /// Flip the processed flag on the image record and its task row
    fn mark_processed(&self, batch_id: &str, image_id: &str) -> Result<()>;

    /// Remove an image with its file records and album links
    fn delete_image(&self, image_id: &str) -> Result<bool>;

    fn create_file(&self, record: &FileRecord) -> Result<()>;

    fn list_files(&self, image_id: &str) -> Result<Vec<FileRecord>>;

    fn find_file(&self, image_id: &str, filename: &str) -> Result<Option<FileRecord>>;

    fn create_task_row(&self, row: &ImportTaskRow) -> Result<()>;

    fn list_task_rows(&self, batch_id: &str) -> Result<Vec<ImportTaskRow>>;

    fn create_album(&self, album: &Album) -> Result<()>;

    fn get_album(&self, album_id: &str) -> Result<Option<Album>>;

    fn link_image_to_album(&self, album_id: &str, image_id: &str) -> Result<()>;

    fn list_album_images(&self, album_id: &str) -> Result<Vec<String>>;

    fn health_check(&self) -> Result<()>;
}
