use crate::{
    domain::ImageRepository,
    errors::RepoError,
    models::{ProductImage, ReferenceKind},
};
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

/// SQLite-backed image metadata store. Every method is one short
/// autocommit statement; no transaction is ever held across blob I/O.
#[derive(Clone)]
pub struct SqliteImageRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImageRepository {
    pub fn new(conn: Connection) -> Self {
        info!("Initializing SqliteImageRepository");
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepoError> {
        self.conn
            .lock()
            .map_err(|_| RepoError::BackendError(anyhow::anyhow!("SQLite connection mutex poisoned")))
    }
}

#[async_trait]
impl ImageRepository for SqliteImageRepository {
    async fn create(&self, image: &ProductImage) -> Result<(), RepoError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO product_images (id, product_id, reference, kind) VALUES (?1, ?2, ?3, ?4)",
            params![
                image.id.to_string(),
                image.product_id,
                image.reference,
                image.kind.as_str(),
            ],
        )
        .context(format!("SQLite: failed to insert image record (id: {})", image.id))
        .map_err(RepoError::BackendError)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ProductImage>, RepoError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, product_id, reference, kind FROM product_images WHERE id = ?1",
                params![id.to_string()],
                row_to_image,
            )
            .optional()
            .context(format!("SQLite: failed to get image record (id: {})", id))
            .map_err(RepoError::BackendError)?;

        match row {
            Some(parsed) => Ok(Some(parsed?)),
            None => Ok(None), // Record not found is not an error
        }
    }

    async fn list_by_product(&self, product_id: i64) -> Result<Vec<ProductImage>, RepoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, product_id, reference, kind FROM product_images WHERE product_id = ?1 ORDER BY rowid")
            .context("SQLite: failed to prepare image listing")
            .map_err(RepoError::BackendError)?;

        let rows = stmt
            .query_map(params![product_id], row_to_image)
            .context(format!("SQLite: failed to list images for product {}", product_id))
            .map_err(RepoError::BackendError)?;

        let mut images = Vec::new();
        for row in rows {
            let parsed = row
                .context("SQLite: failed to read image row")
                .map_err(RepoError::BackendError)?;
            images.push(parsed?);
        }
        Ok(images)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let conn = self.conn()?;
        // Deleting an absent row is a no-op.
        conn.execute(
            "DELETE FROM product_images WHERE id = ?1",
            params![id.to_string()],
        )
        .context(format!("SQLite: failed to delete image record (id: {})", id))
        .map_err(RepoError::BackendError)?;
        Ok(())
    }
}

// Maps a row to a ProductImage, deferring id/kind parse failures so they
// surface as DataCorruption rather than a generic driver error.
fn row_to_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<ProductImage, RepoError>> {
    let id_str: String = row.get(0)?;
    let product_id: i64 = row.get(1)?;
    let reference: String = row.get(2)?;
    let kind_str: String = row.get(3)?;

    let parsed = (|| {
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| RepoError::DataCorruption(format!("bad image id {:?}: {}", id_str, e)))?;
        let kind = ReferenceKind::from_str(&kind_str)
            .map_err(RepoError::DataCorruption)?;
        Ok(ProductImage {
            id,
            product_id,
            reference,
            kind,
        })
    })();

    Ok(parsed)
}
