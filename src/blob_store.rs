//! Blob Storage Abstraction
//!
//! Stores evidence attachments. Records hold only the returned reference; the
//! bytes live here. Local filesystem backs the server; an in-memory store backs
//! unit tests.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Error type for blob storage operations
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blob reference: {0}")]
    InvalidRef(String),

    #[error("Blob not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store binary content under `key`, return reference URI
    async fn store(&self, key: &str, content: &[u8]) -> Result<String, BlobStoreError>;

    /// Fetch binary content by reference
    async fn fetch(&self, blob_ref: &str) -> Result<Vec<u8>, BlobStoreError>;

    /// Delete binary content. Deleting a missing blob is not an error.
    async fn delete(&self, blob_ref: &str) -> Result<(), BlobStoreError>;

    async fn exists(&self, blob_ref: &str) -> Result<bool, BlobStoreError>;
}

/// Reduce a client-supplied filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Local filesystem implementation
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf, BlobStoreError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(BlobStoreError::InvalidRef(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }

    /// Extract path from blob_ref (file:// URI); must stay under the base path.
    fn path_from_ref(&self, blob_ref: &str) -> Result<PathBuf, BlobStoreError> {
        let path = blob_ref
            .strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| {
                BlobStoreError::InvalidRef(format!("Expected file:// prefix: {}", blob_ref))
            })?;
        let contained = path.starts_with(&self.base_path)
            && !path.components().any(|c| matches!(c, Component::ParentDir));
        if !contained {
            return Err(BlobStoreError::InvalidRef(blob_ref.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, key: &str, content: &[u8]) -> Result<String, BlobStoreError> {
        let path = self.path_for_key(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, content).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn fetch(&self, blob_ref: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.path_from_ref(blob_ref)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(blob_ref.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, blob_ref: &str) -> Result<(), BlobStoreError> {
        let path = self.path_from_ref(blob_ref)?;

        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, blob_ref: &str) -> Result<bool, BlobStoreError> {
        let path = self.path_from_ref(blob_ref)?;
        Ok(tokio::fs::try_exists(path).await?)
    }
}

/// In-memory blob store (for testing)
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: tokio::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store(&self, key: &str, content: &[u8]) -> Result<String, BlobStoreError> {
        let blob_ref = format!("memory://{}", key);
        self.blobs
            .write()
            .await
            .insert(blob_ref.clone(), content.to_vec());
        Ok(blob_ref)
    }

    async fn fetch(&self, blob_ref: &str) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .read()
            .await
            .get(blob_ref)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(blob_ref.to_string()))
    }

    async fn delete(&self, blob_ref: &str) -> Result<(), BlobStoreError> {
        self.blobs.write().await.remove(blob_ref);
        Ok(())
    }

    async fn exists(&self, blob_ref: &str) -> Result<bool, BlobStoreError> {
        Ok(self.blobs.read().await.contains_key(blob_ref))
    }
}
