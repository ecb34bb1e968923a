use crate::{domain::BlobStorage, errors::StorageError, models::ReferenceKind};
use anyhow::Context;
use async_trait::async_trait;
use azure_core::StatusCode;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::*;
use tracing;

/// Azure Blob Storage backend. Blob keys map to blob names inside one
/// configured container; the persisted reference is the blob's canonical
/// URL.
#[derive(Clone)]
pub struct AzureBlobStorage {
    container_client: ContainerClient,
}

impl AzureBlobStorage {
    /// Create from storage account name + access key + container name.
    pub fn new(account: &str, access_key: &str, container: &str) -> Self {
        let credentials = StorageCredentials::access_key(account, access_key.to_string());
        let container_client = ClientBuilder::new(account, credentials).container_client(container);
        Self { container_client }
    }

    /// Creates the container if it does not exist yet, absorbing the
    /// already-exists response.
    pub async fn ensure_container(&self) -> Result<(), StorageError> {
        match self.container_client.create().await {
            Ok(_) => {
                tracing::info!("Azure: container created");
                Ok(())
            }
            Err(e) => {
                let already_exists = e
                    .as_http_error()
                    .is_some_and(|http| http.status() == StatusCode::Conflict);
                if already_exists {
                    tracing::info!("Azure: container already exists, no action needed");
                    Ok(())
                } else {
                    Err(StorageError::BackendError(
                        anyhow::Error::new(e).context("Azure: failed to create container"),
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl BlobStorage for AzureBlobStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, StorageError> {
        tracing::debug!(blob_key = %key, content_type = ?content_type, "Azure: uploading blob");

        let blob_client = self.container_client.blob_client(key);
        // Block blob puts overwrite by default, matching the collision policy.
        let mut builder = blob_client.put_block_blob(data);
        if let Some(ct) = content_type {
            builder = builder.content_type(ct);
        }
        builder
            .await
            .context(format!("Azure: failed to upload blob with key '{}'", key))
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let url = blob_client
            .url()
            .context(format!("Azure: failed to build URL for blob '{}'", key))
            .map_err(StorageError::BackendError)?;

        tracing::debug!(blob_key = %key, "Azure: upload successful");
        Ok(url.to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tracing::debug!(blob_key = %key, "Azure: deleting blob");

        match self.container_client.blob_client(key).delete().await {
            Ok(_) => Ok(()),
            Err(e) => {
                // A missing blob must count as success, matching Local's
                // idempotent delete.
                let not_found = e
                    .as_http_error()
                    .is_some_and(|http| http.status() == StatusCode::NotFound);
                if not_found {
                    tracing::debug!(blob_key = %key, "Azure: blob already absent");
                    Ok(())
                } else {
                    tracing::error!(blob_key = %key, error = %e, "Azure: error deleting blob");
                    Err(StorageError::BackendError(
                        anyhow::Error::new(e)
                            .context(format!("Azure: failed to delete blob with key '{}'", key)),
                    ))
                }
            }
        }
    }

    async fn resolve_url(&self, key: &str) -> Result<String, StorageError> {
        let url = self
            .container_client
            .blob_client(key)
            .url()
            .context(format!("Azure: failed to build URL for blob '{}'", key))
            .map_err(StorageError::BackendError)?;
        Ok(url.to_string())
    }

    fn kind(&self) -> ReferenceKind {
        ReferenceKind::Cloud
    }
}
