use crate::errors::AppError;
use rusqlite::Connection;
use std::path::Path;
use tracing;

/// Creates the image metadata schema if it doesn't exist.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS product_images (
             id         TEXT PRIMARY KEY,
             product_id INTEGER NOT NULL,
             reference  TEXT NOT NULL,
             kind       TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_product_images_product
             ON product_images (product_id);",
    )
}

/// Opens the metadata database and ensures the schema exists.
pub fn init_database(path: &Path) -> Result<Connection, AppError> {
    tracing::info!("Startup: Opening metadata database at {}", path.display());
    let conn = Connection::open(path)
        .map_err(|e| AppError::InitError(format!("Failed to open database {}: {}", path.display(), e)))?;
    init_schema(&conn)
        .map_err(|e| AppError::InitError(format!("Failed to initialize image schema: {}", e)))?;
    tracing::info!("Startup: Image schema ready.");
    Ok(conn)
}
