use crate::{
    domain::{BlobStorage, ImageRepository},
    errors::ImageError,
    models::{blob_key_from_reference, generate_blob_key, ProductImage},
};
use std::sync::Arc;
use tracing;
use uuid::Uuid;

/// The single owner of the image lifecycle: converts an uploaded byte
/// buffer into a durable, catalog-referenced image and tears one down,
/// keeping the metadata row consistent with the physical blob.
///
/// Consistency is a two-step saga, not a transaction: the blob operation
/// always resolves before the metadata statement runs, and attach carries
/// a compensating delete for the one window where the two can diverge.
#[derive(Clone)]
pub struct ProductImageManager {
    storage: Arc<dyn BlobStorage>,
    images: Arc<dyn ImageRepository>,
}

impl ProductImageManager {
    pub fn new(storage: Arc<dyn BlobStorage>, images: Arc<dyn ImageRepository>) -> Self {
        Self { storage, images }
    }

    /// Uploads `data` for `product_id` and persists the image record.
    ///
    /// A failed upload aborts with no metadata side effect. A failed
    /// metadata write after a successful upload triggers a compensating
    /// blob delete; if that also fails the orphaned asset is logged as a
    /// warning and the original failure is returned. No retry loop.
    pub async fn attach_image(
        &self,
        product_id: i64,
        filename: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ProductImage, ImageError> {
        let key = generate_blob_key(product_id, filename);
        tracing::debug!(product_id, blob_key = %key, "Attaching image");

        let reference = self.storage.upload(&key, data, content_type).await?;

        let image = ProductImage {
            id: Uuid::new_v4(),
            product_id,
            reference,
            kind: self.storage.kind(),
        };

        if let Err(repo_err) = self.images.create(&image).await {
            tracing::error!(
                product_id,
                blob_key = %key,
                error = ?repo_err,
                "Metadata write failed after upload; attempting compensating delete"
            );
            match self.storage.delete(&key).await {
                Ok(()) => {
                    tracing::debug!(blob_key = %key, "Compensating delete removed uploaded blob");
                }
                Err(del_err) => {
                    // Operational visibility only; the attach already
                    // failed for the real reason.
                    tracing::warn!(
                        blob_key = %key,
                        error = ?del_err,
                        "Orphaned asset: compensating delete failed, blob left behind"
                    );
                }
            }
            return Err(ImageError::Repo(repo_err));
        }

        tracing::info!(image_id = %image.id, product_id, "Image attached");
        Ok(image)
    }

    /// Deletes the blob and then the metadata row for `image_id`.
    ///
    /// Idempotent: a missing record is a successful no-op. The blob goes
    /// first so a crash between the steps leaves a detectable orphaned
    /// record rather than a dangling reference. A reference that fails to
    /// parse under its own kind tag is surfaced as
    /// `UnrecognizedReference` and the record is left untouched.
    pub async fn detach_image(&self, image_id: Uuid) -> Result<(), ImageError> {
        let Some(image) = self.images.get_by_id(image_id).await? else {
            tracing::debug!(%image_id, "Image already detached, nothing to do");
            return Ok(());
        };

        let key = blob_key_from_reference(image.kind, &image.reference)
            .ok_or_else(|| ImageError::UnrecognizedReference(image.reference.clone()))?;

        self.storage.delete(&key).await?;
        self.images.delete(image_id).await?;

        tracing::info!(%image_id, product_id = image.product_id, "Image detached");
        Ok(())
    }

    /// Detaches every image owned by `product_id`. A failure on one record
    /// does not abort the remainder; failures are collected and surfaced
    /// once, in aggregate, after all attempts complete. Failed records
    /// stay in place so the call can be re-run.
    pub async fn detach_all_for_product(&self, product_id: i64) -> Result<(), ImageError> {
        let images = self.images.list_by_product(product_id).await?;
        let attempted = images.len();
        let mut failed = Vec::new();

        for image in images {
            if let Err(e) = self.detach_image(image.id).await {
                tracing::error!(image_id = %image.id, product_id, error = ?e, "Image detach failed");
                failed.push((image.id, e));
            }
        }

        if failed.is_empty() {
            tracing::info!(product_id, attempted, "All images detached");
            Ok(())
        } else {
            Err(ImageError::BulkDetach { attempted, failed })
        }
    }

    pub async fn get_image(&self, image_id: Uuid) -> Result<Option<ProductImage>, ImageError> {
        Ok(self.images.get_by_id(image_id).await?)
    }

    pub async fn list_images(&self, product_id: i64) -> Result<Vec<ProductImage>, ImageError> {
        Ok(self.images.list_by_product(product_id).await?)
    }

    /// Resolves the access URL for a record through the active backend.
    pub async fn image_url(&self, image: &ProductImage) -> Result<String, ImageError> {
        let key = blob_key_from_reference(image.kind, &image.reference)
            .ok_or_else(|| ImageError::UnrecognizedReference(image.reference.clone()))?;
        Ok(self.storage.resolve_url(&key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlobStorage, ImageRepository};
    use crate::errors::{RepoError, StorageError};
    use crate::models::ReferenceKind;
    use crate::repositories::SqliteImageRepository;
    use crate::startup::init_schema;
    use crate::storage::LocalBlobStorage;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Wraps the real local backend with switchable fault injection.
    struct FaultyStorage {
        inner: LocalBlobStorage,
        fail_uploads: AtomicBool,
        deny_deletes: Mutex<HashSet<String>>,
        deny_all_deletes: AtomicBool,
    }

    impl FaultyStorage {
        fn new(inner: LocalBlobStorage) -> Self {
            Self {
                inner,
                fail_uploads: AtomicBool::new(false),
                deny_deletes: Mutex::new(HashSet::new()),
                deny_all_deletes: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl BlobStorage for FaultyStorage {
        async fn upload(
            &self,
            key: &str,
            data: Vec<u8>,
            content_type: Option<String>,
        ) -> Result<String, StorageError> {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(StorageError::UploadFailed("injected upload failure".into()));
            }
            self.inner.upload(key, data, content_type).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            if self.deny_all_deletes.load(Ordering::SeqCst)
                || self.deny_deletes.lock().unwrap().contains(key)
            {
                return Err(StorageError::BackendError(anyhow::anyhow!(
                    "injected delete failure for {key}"
                )));
            }
            self.inner.delete(key).await
        }

        async fn resolve_url(&self, key: &str) -> Result<String, StorageError> {
            self.inner.resolve_url(key).await
        }

        fn kind(&self) -> ReferenceKind {
            self.inner.kind()
        }
    }

    /// Wraps the real repository so a metadata write can be made to fail.
    struct FaultyRepo {
        inner: SqliteImageRepository,
        fail_creates: AtomicBool,
    }

    impl FaultyRepo {
        fn new(inner: SqliteImageRepository) -> Self {
            Self {
                inner,
                fail_creates: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ImageRepository for FaultyRepo {
        async fn create(&self, image: &ProductImage) -> Result<(), RepoError> {
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err(RepoError::BackendError(anyhow::anyhow!(
                    "injected metadata write failure"
                )));
            }
            self.inner.create(image).await
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Option<ProductImage>, RepoError> {
            self.inner.get_by_id(id).await
        }

        async fn list_by_product(&self, product_id: i64) -> Result<Vec<ProductImage>, RepoError> {
            self.inner.list_by_product(product_id).await
        }

        async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
            self.inner.delete(id).await
        }
    }

    struct Harness {
        tmp: TempDir,
        storage: Arc<FaultyStorage>,
        repo: Arc<FaultyRepo>,
        manager: ProductImageManager,
    }

    fn harness() -> Harness {
        let tmp = TempDir::new().unwrap();
        let storage = Arc::new(FaultyStorage::new(LocalBlobStorage::new(tmp.path()).unwrap()));
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = Arc::new(FaultyRepo::new(SqliteImageRepository::new(conn)));
        let manager = ProductImageManager::new(storage.clone(), repo.clone());
        Harness {
            tmp,
            storage,
            repo,
            manager,
        }
    }

    fn blob_path(h: &Harness, image: &ProductImage) -> std::path::PathBuf {
        let key = blob_key_from_reference(image.kind, &image.reference).unwrap();
        h.tmp.path().join("images/products").join(key)
    }

    #[tokio::test]
    async fn attach_writes_blob_and_record() {
        let h = harness();

        let image = h
            .manager
            .attach_image(42, "cat.png", vec![0x1, 0x2, 0x3], None)
            .await
            .unwrap();

        assert_eq!(image.product_id, 42);
        assert_eq!(image.kind, ReferenceKind::Local);
        assert!(image.reference.starts_with(r"\images\products\product-42\"));
        assert!(image.reference.ends_with(".png"));

        assert_eq!(std::fs::read(blob_path(&h, &image)).unwrap(), vec![0x1, 0x2, 0x3]);
        assert_eq!(h.manager.get_image(image.id).await.unwrap(), Some(image.clone()));
        // The stored reference resolves through the active backend.
        assert_eq!(h.manager.image_url(&image).await.unwrap(), image.reference);
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_record() {
        let h = harness();
        h.storage.fail_uploads.store(true, Ordering::SeqCst);

        let err = h
            .manager
            .attach_image(1, "a.png", vec![1], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::Storage(_)));
        assert!(h.manager.list_images(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_metadata_write_compensates_by_deleting_blob() {
        let h = harness();
        h.repo.fail_creates.store(true, Ordering::SeqCst);

        let err = h
            .manager
            .attach_image(7, "b.png", vec![4, 5], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::Repo(_)));
        assert!(h.manager.list_images(7).await.unwrap().is_empty());
        // Compensation removed the uploaded blob.
        let product_dir = h.tmp.path().join("images/products/product-7");
        let leftovers = std::fs::read_dir(&product_dir)
            .map(|d| d.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn failed_compensation_still_reports_original_failure() {
        let h = harness();
        h.repo.fail_creates.store(true, Ordering::SeqCst);
        h.storage.deny_all_deletes.store(true, Ordering::SeqCst);

        let err = h
            .manager
            .attach_image(7, "c.png", vec![6], None)
            .await
            .unwrap_err();

        // The repo failure wins; the orphaned asset is only a warning.
        assert!(matches!(err, ImageError::Repo(_)));
        let product_dir = h.tmp.path().join("images/products/product-7");
        assert_eq!(std::fs::read_dir(&product_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn attach_then_detach_leaves_nothing_behind() {
        let h = harness();
        let image = h
            .manager
            .attach_image(3, "d.png", vec![7, 8], None)
            .await
            .unwrap();
        let path = blob_path(&h, &image);

        h.manager.detach_image(image.id).await.unwrap();

        assert!(!path.exists());
        assert_eq!(h.manager.get_image(image.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn detach_is_idempotent() {
        let h = harness();
        let image = h
            .manager
            .attach_image(3, "e.png", vec![9], None)
            .await
            .unwrap();

        h.manager.detach_image(image.id).await.unwrap();
        // Second detach of the same id must not error.
        h.manager.detach_image(image.id).await.unwrap();
        // Nor does detaching an id that never existed.
        h.manager.detach_image(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_reference_is_surfaced_and_record_kept() {
        let h = harness();
        let bad = ProductImage {
            id: Uuid::new_v4(),
            product_id: 9,
            reference: "not-a-reference".to_string(),
            kind: ReferenceKind::Local,
        };
        h.repo.create(&bad).await.unwrap();

        let err = h.manager.detach_image(bad.id).await.unwrap_err();
        assert!(matches!(err, ImageError::UnrecognizedReference(_)));
        // The record stays inspectable.
        assert_eq!(h.manager.get_image(bad.id).await.unwrap(), Some(bad));
    }

    #[tokio::test]
    async fn bulk_detach_collects_failures_and_is_retryable() {
        let h = harness();
        let a = h.manager.attach_image(5, "a.png", vec![1], None).await.unwrap();
        let b = h.manager.attach_image(5, "b.png", vec![2], None).await.unwrap();
        let c = h.manager.attach_image(5, "c.png", vec![3], None).await.unwrap();

        let denied_key = blob_key_from_reference(b.kind, &b.reference).unwrap();
        h.storage.deny_deletes.lock().unwrap().insert(denied_key.clone());

        let err = h.manager.detach_all_for_product(5).await.unwrap_err();
        match err {
            ImageError::BulkDetach { attempted, failed } => {
                assert_eq!(attempted, 3);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].0, b.id);
            }
            other => panic!("expected BulkDetach, got {:?}", other),
        }

        // The two healthy images are gone; the failed one is kept for retry.
        assert_eq!(h.manager.get_image(a.id).await.unwrap(), None);
        assert_eq!(h.manager.get_image(c.id).await.unwrap(), None);
        assert_eq!(h.manager.list_images(5).await.unwrap(), vec![b.clone()]);

        // Once the backend is healthy again the re-run empties the product.
        h.storage.deny_deletes.lock().unwrap().remove(&denied_key);
        h.manager.detach_all_for_product(5).await.unwrap();
        assert!(h.manager.list_images(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn detach_all_on_empty_product_is_ok() {
        let h = harness();
        h.manager.detach_all_for_product(999).await.unwrap();
    }
}
