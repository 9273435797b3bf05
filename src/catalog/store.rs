use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::Catalog;
use super::error::{CatalogError, Result};
use super::models::{Album, FileRecord, ImageRecord, ImportTaskRow};
use super::partitions::{
    decode_album_image_key, encode_album_image_key, encode_album_image_prefix, encode_album_key,
    encode_file_key, encode_file_prefix, encode_image_key, encode_task_key, encode_task_prefix,
};

/// Fjall-backed catalog of images, stored files, task rows and albums
pub struct FjallCatalog {
    keyspace: Keyspace,
    images: PartitionHandle,
    files: PartitionHandle,
    tasks: PartitionHandle,
    albums: PartitionHandle,
    album_images: PartitionHandle,
    // Serializes read-modify-write sequences (insert-if-absent, flag flips)
    write_lock: Mutex<()>,
}

impl FjallCatalog {
    /// Open or create a catalog at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening catalog at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let images = keyspace.open_partition("images", PartitionCreateOptions::default())?;
        let files = keyspace.open_partition("files", PartitionCreateOptions::default())?;
        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        let albums = keyspace.open_partition("albums", PartitionCreateOptions::default())?;
        let album_images =
            keyspace.open_partition("album_images", PartitionCreateOptions::default())?;

        info!("Catalog opened successfully");
        Ok(Self {
            keyspace,
            images,
            files,
            tasks,
            albums,
            album_images,
            write_lock: Mutex::new(()),
        })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Get internal statistics (for debugging/monitoring)
    pub fn stats(&self) -> Result<CatalogStats> {
        Ok(CatalogStats {
            image_count: count(&self.images)?,
            file_count: count(&self.files)?,
            task_count: count(&self.tasks)?,
            album_count: count(&self.albums)?,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Catalog for FjallCatalog {
    fn create_image(&self, record: &ImageRecord) -> Result<bool> {
        let _guard = self.lock();
        let key = encode_image_key(&record.image_id);

        if self.images.contains_key(&key)? {
            debug!(image_id = %record.image_id, "Image already catalogued");
            return Ok(false);
        }

        self.images.insert(key, serde_json::to_vec(record)?)?;
        debug!(image_id = %record.image_id, "Created image");
        Ok(true)
    }

    fn get_image(&self, image_id: &str) -> Result<Option<ImageRecord>> {
        get_json(&self.images, encode_image_key(image_id))
    }

    fn mark_processed(&self, batch_id: &str, image_id: &str) -> Result<()> {
        let _guard = self.lock();
        let image_key = encode_image_key(image_id);
        let task_key = encode_task_key(batch_id, image_id);

        let image: Option<ImageRecord> = get_json(&self.images, &image_key)?;
        let row: Option<ImportTaskRow> = get_json(&self.tasks, &task_key)?;
        if image.is_none() && row.is_none() {
            return Err(CatalogError::ImageNotFound(image_id.to_string()));
        }

        let mut batch = self.keyspace.batch();
        if let Some(mut image) = image {
            image.is_processed = true;
            batch.insert(&self.images, image_key, serde_json::to_vec(&image)?);
        }
        if let Some(mut row) = row {
            row.is_processed = true;
            batch.insert(&self.tasks, task_key, serde_json::to_vec(&row)?);
        }
        batch.commit()?;

        debug!(image_id, batch_id, "Marked processed");
        Ok(())
    }

    fn delete_image(&self, image_id: &str) -> Result<bool> {
        let _guard = self.lock();
        let image_key = encode_image_key(image_id);
        let existed = self.images.contains_key(&image_key)?;

        let mut batch = self.keyspace.batch();
        batch.remove(&self.images, image_key);

        for item in self.files.prefix(encode_file_prefix(image_id)) {
            let (key, _) = item?;
            batch.remove(&self.files, key);
        }

        for item in self.album_images.iter() {
            let (key, _) = item?;
            if decode_album_image_key(&key).is_some_and(|(_, linked)| linked == image_id) {
                batch.remove(&self.album_images, key);
            }
        }

        batch.commit()?;
        debug!(image_id, existed, "Deleted image");
        Ok(existed)
    }

    fn create_file(&self, record: &FileRecord) -> Result<()> {
        let key = encode_file_key(&record.image_id, &record.file_id);
        self.files.insert(key, serde_json::to_vec(record)?)?;
        debug!(image_id = %record.image_id, filename = %record.filename, "Created file");
        Ok(())
    }

    fn list_files(&self, image_id: &str) -> Result<Vec<FileRecord>> {
        scan_json(&self.files, encode_file_prefix(image_id))
    }

    fn find_file(&self, image_id: &str, filename: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .list_files(image_id)?
            .into_iter()
            .find(|file| file.filename == filename))
    }

    fn create_task_row(&self, row: &ImportTaskRow) -> Result<()> {
        let key = encode_task_key(&row.import_batch_id, &row.image_id);
        self.tasks.insert(key, serde_json::to_vec(row)?)?;
        Ok(())
    }

    fn list_task_rows(&self, batch_id: &str) -> Result<Vec<ImportTaskRow>> {
        scan_json(&self.tasks, encode_task_prefix(batch_id))
    }

    fn create_album(&self, album: &Album) -> Result<()> {
        let key = encode_album_key(&album.album_id);
        self.albums.insert(key, serde_json::to_vec(album)?)?;
        debug!(album_id = %album.album_id, "Created album");
        Ok(())
    }

    fn get_album(&self, album_id: &str) -> Result<Option<Album>> {
        get_json(&self.albums, encode_album_key(album_id))
    }

    fn link_image_to_album(&self, album_id: &str, image_id: &str) -> Result<()> {
        if !self.albums.contains_key(encode_album_key(album_id))? {
            return Err(CatalogError::AlbumNotFound(album_id.to_string()));
        }

        let key = encode_album_image_key(album_id, image_id);
        self.album_images
            .insert(key, Utc::now().to_rfc3339().into_bytes())?;
        debug!(album_id, image_id, "Linked image to album");
        Ok(())
    }

    fn list_album_images(&self, album_id: &str) -> Result<Vec<String>> {
        let mut image_ids = Vec::new();
        for item in self.album_images.prefix(encode_album_image_prefix(album_id)) {
            let (key, _) = item?;
            if let Some((_, image_id)) = decode_album_image_key(&key) {
                image_ids.push(image_id);
            }
        }
        Ok(image_ids)
    }

    fn health_check(&self) -> Result<()> {
        let _ = self.albums.first_key_value()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub image_count: usize,
    pub file_count: usize,
    pub task_count: usize,
    pub album_count: usize,
}

fn get_json<T: DeserializeOwned, K: AsRef<[u8]>>(
    partition: &PartitionHandle,
    key: K,
) -> Result<Option<T>> {
    match partition.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
        None => Ok(None),
    }
}

fn scan_json<T: DeserializeOwned>(partition: &PartitionHandle, prefix: Vec<u8>) -> Result<Vec<T>> {
    let mut results = Vec::new();
    for item in partition.prefix(prefix) {
        let (_, value) = item?;
        results.push(serde_json::from_slice(&value)?);
    }
    Ok(results)
}

fn count(partition: &PartitionHandle) -> Result<usize> {
    let mut total = 0;
    for item in partition.iter() {
        item?;
        total += 1;
    }
    Ok(total)
}
