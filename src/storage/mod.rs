//! Object storage for uploads, originals and renditions
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStore, PutOptions, path::Path as StoragePath,
};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

impl StorageError {
    fn from_store(key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::ObjectStoreError(other),
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    // LocalFileSystem rejects object attributes
    content_type_attributes: bool,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String) -> Self {
        Self {
            store,
            bucket,
            content_type_attributes: true,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "darkroom-local".to_string())
    }

    /// Build the backend selected in configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Memory => Ok(Self::in_memory()),
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.root)?;
                let store = LocalFileSystem::new_with_prefix(&config.root)?;
                Ok(Self {
                    store: Arc::new(store),
                    bucket: config.bucket.clone(),
                    content_type_attributes: false,
                })
            }
            StorageProvider::S3 => {
                let (Some(access_key), Some(secret_key)) =
                    (&config.access_key, &config.secret_key)
                else {
                    return Err(StorageError::InvalidConfig(
                        "S3 storage requires access and secret keys".to_string(),
                    ));
                };

                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&config.bucket)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }

                Ok(Self::new(Arc::new(builder.build()?), config.bucket.clone()))
            }
        }
    }

    /// Fetch an object's bytes
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let path = StoragePath::from(key);

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| StorageError::from_store(key, e))?;
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Downloaded from storage");

        Ok(bytes)
    }

    /// Store bytes under `key` with the given content type
    pub async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let mut opts = PutOptions::default();
        if self.content_type_attributes {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            opts.attributes = attributes;
        }

        let put_result = self.store.put_opts(&path, data.into(), opts).await?;

        tracing::info!(key, size, content_type, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Delete an object
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);
        self.store
            .delete(&path)
            .await
            .map_err(|e| StorageError::from_store(key, e))?;

        tracing::debug!(key, "Deleted from storage");
        Ok(())
    }

    /// List every key under a prefix, recursively
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = StoragePath::from(prefix);
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        let mut keys: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Content type recorded at upload, if the backend keeps attributes
    pub async fn content_type(&self, key: &str) -> Result<Option<String>> {
        let path = StoragePath::from(key);
        let opts = GetOptions {
            head: true,
            ..Default::default()
        };

        let result = self
            .store
            .get_opts(&path, opts)
            .await
            .map_err(|e| StorageError::from_store(key, e))?;

        Ok(result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.to_string()))
    }

    /// Health check - verify the backend answers a listing
    pub async fn health_check(&self) -> Result<()> {
        self.store.list_with_delimiter(None).await?;
        Ok(())
    }
}
