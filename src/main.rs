use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod domain;
mod errors;
mod handlers;
mod manager;
mod models;
mod repositories;
mod routes;
mod startup;
mod storage;

use crate::config::{Config, StorageConfig};
use crate::domain::BlobStorage;
use crate::errors::AppError;
use crate::manager::ProductImageManager;
use crate::repositories::SqliteImageRepository;
use crate::storage::{AzureBlobStorage, LocalBlobStorage};

/// AppState holds shared resources for the web server.
#[derive(Clone)]
struct AppState {
    manager: ProductImageManager,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "catalog_image_service=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present (optional, good for development)
    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(".env file loaded from path: {}", path.display()),
        Err(_) => tracing::info!(".env file not found, relying on environment variables"),
    };

    let config = Config::load()?;

    // --- Metadata store ---
    let conn = startup::init_database(&config.database_path)?;
    let images = Arc::new(SqliteImageRepository::new(conn));

    // --- Blob backend (selected once, here; never branched on again) ---
    let (blob_storage, local_media_root): (Arc<dyn BlobStorage>, Option<std::path::PathBuf>) =
        match &config.storage {
            StorageConfig::Local { media_root } => {
                tracing::info!(media_root = %media_root.display(), "Using local blob storage");
                let storage = LocalBlobStorage::new(media_root.clone())
                    .map_err(|e| AppError::InitError(format!("Failed to init local storage: {}", e)))?;
                (Arc::new(storage), Some(media_root.clone()))
            }
            StorageConfig::Azure {
                account,
                access_key,
                container,
            } => {
                tracing::info!(%account, %container, "Using Azure blob storage");
                let storage = AzureBlobStorage::new(account, access_key, container);
                storage
                    .ensure_container()
                    .await
                    .map_err(|e| AppError::InitError(format!("Failed to ensure container: {}", e)))?;
                (Arc::new(storage), None)
            }
        };

    // --- Application State ---
    let state = Arc::new(AppState {
        manager: ProductImageManager::new(blob_storage, images),
    });

    // --- Router & Server Startup ---
    let app = routes::create_router(state, local_media_root.as_deref());

    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
