use crate::errors::{RepoError, StorageError};
use crate::models::{ProductImage, ReferenceKind};
use async_trait::async_trait;
use uuid::Uuid;

/// Trait defining operations for storing and retrieving image metadata.
#[async_trait]
pub trait ImageRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Persists a new image record. Each call is its own short transaction.
    async fn create(&self, image: &ProductImage) -> Result<(), RepoError>;

    /// Retrieves an image record by its unique ID.
    /// Returns Ok(None) if the record is not found.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<ProductImage>, RepoError>;

    /// Lists all image records owned by a product.
    async fn list_by_product(&self, product_id: i64) -> Result<Vec<ProductImage>, RepoError>;

    /// Removes an image record. Deleting an absent record is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;
}

/// Trait defining the uniform capability of a blob storage backend.
/// Exactly two variants exist (local filesystem, Azure blob storage);
/// the active one is chosen once at configuration time and injected,
/// never branched on inside business logic.
#[async_trait]
pub trait BlobStorage: Send + Sync + 'static {
    /// Uploads blob content under `key`, durably stored before the call
    /// returns. Overwriting an existing key is acceptable and must not
    /// error. Returns the persistable reference for the blob.
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, StorageError>;

    /// Deletes the blob under `key`. Idempotent: a missing blob is success.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Returns an access path/URL for `key`. Local passes the root-relative
    /// reference through; the cloud variant returns the authoritative URL.
    async fn resolve_url(&self, key: &str) -> Result<String, StorageError>;

    /// Which reference shape this backend persists.
    fn kind(&self) -> ReferenceKind;
}
