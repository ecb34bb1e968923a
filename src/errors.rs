use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error),

    #[error("Corrupt image row: {0}")]
    DataCorruption(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob upload failed: {0}")]
    UploadFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

// --- Manager Errors ---

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Could not perform blob storage operation")]
    Storage(#[from] StorageError),

    #[error("Could not persist image metadata")]
    Repo(#[from] RepoError),

    /// The persisted reference does not parse under its own kind tag.
    /// The offending record is skipped, never deleted.
    #[error("Unrecognized image reference format: {0:?}")]
    UnrecognizedReference(String),

    /// Aggregate result of a bulk detach; carries every failed image id.
    #[error("{} of {attempted} image detachments failed", failed.len())]
    BulkDetach {
        attempted: usize,
        failed: Vec<(Uuid, ImageError)>,
    },
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing form field: {0}")]
    MissingFormField(String),
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),
    #[error("Invalid image ID format: {0}")]
    InvalidUuid(#[from] uuid::Error),

    // Domain/Service level errors
    #[error("Image not found with ID: {0}")]
    ImageNotFound(Uuid),
    #[error("Image operation failed")]
    Image(#[source] ImageError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        AppError::Image(err)
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Lets main use `?` on bind/serve.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InitError(err.to_string())
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MissingFormField(field) => (StatusCode::BAD_REQUEST, format!("Missing form field: {}", field)),
            AppError::MultipartError(e) => (StatusCode::BAD_REQUEST, format!("Invalid multipart form data: {}", e)),
            AppError::InvalidUuid(e) => (StatusCode::BAD_REQUEST, format!("Invalid ID format: {}", e)),
            AppError::ImageNotFound(id) => (StatusCode::NOT_FOUND, format!("Image not found with ID: {}", id)),

            // 5xx Server Errors
            AppError::Image(ImageError::BulkDetach { attempted, failed }) => {
                tracing::error!(attempted, failed = failed.len(), "Bulk image detach partially failed");
                let ids: Vec<String> = failed.iter().map(|(id, _)| id.to_string()).collect();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!(
                        "{} of {} image deletions failed (image ids: {})",
                        failed.len(),
                        attempted,
                        ids.join(", ")
                    ),
                )
            }
            AppError::Image(e) => {
                tracing::error!(error.source = ?e, "Image operation error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Image operation failed".to_string())
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error".to_string())
            }
            AppError::InitError(msg) => {
                tracing::error!("Initialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server initialization error".to_string())
            }
        };

        // Log the specific error variant and message
        tracing::error!(error.message = %error_message, error.detail = %self, "Responding with error");

        let body = Json(serde_json::json!({ "error": error_message }));
        (status, body).into_response()
    }
}
