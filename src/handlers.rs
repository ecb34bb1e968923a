use crate::{
    errors::AppError,
    models::ProductImage,
    AppState,
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mime_guess;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

/// Handler for POST /products/{id}/images: attaches every uploaded file
/// in the multipart body to the product.
pub async fn upload_product_images(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut uploads: Vec<(String, Option<String>, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "images" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload".to_string());
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await?.to_vec();
                uploads.push((filename, content_type, data));
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    if uploads.is_empty() {
        return Err(AppError::MissingFormField("images".to_string()));
    }

    let mut attached = Vec::with_capacity(uploads.len());
    for (filename, content_type, data) in uploads {
        if data.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "image data cannot be empty (file: {})",
                filename
            )));
        }

        // Guess content type more reliably for upload if not provided
        let final_content_type = content_type
            .or_else(|| mime_guess::from_path(&filename).first_raw().map(|s| s.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let image = state
            .manager
            .attach_image(product_id, &filename, data, Some(final_content_type))
            .await?;
        attached.push(image);
    }

    tracing::info!(product_id, count = attached.len(), "Images attached via handler");
    Ok((StatusCode::CREATED, Json(attached)))
}

/// Handler for GET /products/{id}/images.
pub async fn list_product_images(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<ProductImage>>, AppError> {
    tracing::debug!(product_id, "Listing product images via handler");
    let images = state.manager.list_images(product_id).await?;
    Ok(Json(images))
}

/// Handler for GET /images/{id}: the record plus its resolved access URL.
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let image_id = Uuid::parse_str(&id_str)?;
    tracing::debug!(%image_id, "Fetching image details via handler");

    match state.manager.get_image(image_id).await? {
        Some(image) => {
            let url = state.manager.image_url(&image).await?;
            Ok(Json(serde_json::json!({ "image": image, "url": url })))
        }
        None => Err(AppError::ImageNotFound(image_id)),
    }
}

/// Handler for DELETE /images/{id}. Idempotent: an unknown id still
/// returns 204.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<StatusCode, AppError> {
    let image_id = Uuid::parse_str(&id_str)?;
    tracing::debug!(%image_id, "Detaching image via handler");

    state.manager.detach_image(image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for DELETE /products/{id}/images. Partial failures surface as
/// one aggregate error after every record has been attempted.
pub async fn delete_product_images(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(product_id, "Detaching all product images via handler");

    state.manager.detach_all_for_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
