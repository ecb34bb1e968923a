use crate::{
    domain::BlobStorage,
    errors::StorageError,
    models::{local_reference_for_key, ReferenceKind},
};
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing;

/// Filesystem-backed storage under a configured media root. Blob keys map
/// to paths below `<media_root>/images/products/`; the persisted reference
/// is the root-relative backslash path the catalog has always stored.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    media_root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(media_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let media_root = media_root.into();
        std::fs::create_dir_all(&media_root)
            .with_context(|| format!("Local: failed to create media root {}", media_root.display()))?;
        Ok(Self { media_root })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut path = self.media_root.join("images").join("products");
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<String>,
    ) -> Result<String, StorageError> {
        let path = self.blob_path(key);
        tracing::debug!(blob_key = %key, path = %path.display(), "Local: writing blob");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Local: failed to create directory {}", parent.display()))
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        }
        // Overwriting an existing key is fine; `write` truncates.
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Local: failed to write blob at {}", path.display()))
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::debug!(blob_key = %key, "Local: write successful");
        Ok(local_reference_for_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.blob_path(key);
        tracing::debug!(blob_key = %key, path = %path.display(), "Local: deleting blob");

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting a missing file is a no-op, not a failure.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(blob_key = %key, "Local: blob already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::BackendError(
                anyhow::Error::new(e)
                    .context(format!("Local: failed to delete blob at {}", path.display())),
            )),
        }
    }

    async fn resolve_url(&self, key: &str) -> Result<String, StorageError> {
        // Pass-through: the root-relative reference is the access path.
        Ok(local_reference_for_key(key))
    }

    fn kind(&self) -> ReferenceKind {
        ReferenceKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upload_writes_bytes_and_returns_relative_reference() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalBlobStorage::new(tmp.path()).unwrap();

        let reference = storage
            .upload("product-42/3fae21.png", vec![0x1, 0x2, 0x3], None)
            .await
            .unwrap();

        assert!(reference.starts_with(r"\images\products\product-42\"));
        assert!(reference.ends_with(".png"));

        let on_disk = tmp.path().join("images/products/product-42/3fae21.png");
        assert_eq!(std::fs::read(on_disk).unwrap(), vec![0x1, 0x2, 0x3]);
    }

    #[tokio::test]
    async fn upload_overwrites_existing_key() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalBlobStorage::new(tmp.path()).unwrap();

        storage.upload("product-1/a.png", vec![1], None).await.unwrap();
        storage.upload("product-1/a.png", vec![2, 3], None).await.unwrap();

        let on_disk = tmp.path().join("images/products/product-1/a.png");
        assert_eq!(std::fs::read(on_disk).unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalBlobStorage::new(tmp.path()).unwrap();

        storage.upload("product-1/a.png", vec![1], None).await.unwrap();
        storage.delete("product-1/a.png").await.unwrap();
        // Second delete of the same key must not error.
        storage.delete("product-1/a.png").await.unwrap();

        assert!(!tmp.path().join("images/products/product-1/a.png").exists());
    }

    #[tokio::test]
    async fn resolve_url_passes_reference_through() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalBlobStorage::new(tmp.path()).unwrap();

        let reference = storage
            .upload("product-9/b.jpg", vec![9], None)
            .await
            .unwrap();
        assert_eq!(storage.resolve_url("product-9/b.jpg").await.unwrap(), reference);
    }
}
