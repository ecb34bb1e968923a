use crate::{
    handlers, // Import handlers module
    AppState, // Use the AppState defined in main.rs
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Creates the Axum router and associates routes with handlers.
///
/// When the Local backend is active, `local_media_root` is served
/// read-only under `/media` so persisted Local references resolve.
pub fn create_router(state: Arc<AppState>, local_media_root: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route(
            "/products/{id}/images",
            post(handlers::upload_product_images)
                .get(handlers::list_product_images)
                .delete(handlers::delete_product_images),
        )
        .route(
            "/images/{id}",
            get(handlers::get_image).delete(handlers::delete_image),
        );

    if let Some(root) = local_media_root {
        router = router.nest_service("/media", ServeDir::new(root));
    }

    router
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state) // Pass the application state
}
