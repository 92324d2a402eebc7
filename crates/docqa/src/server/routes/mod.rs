//! HTTP routes

pub mod files;
pub mod query;
pub mod status;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(status::info))
        .route("/health", get(status::health))
        // Uploads get the larger body limit
        .route(
            "/upload",
            post(files::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/files", get(files::list_files))
        .route("/files/:filename", delete(files::delete_file))
        .route("/clear-files", post(files::clear_files))
        .route("/query", post(query::query))
        .route("/status", get(status::status))
        .route("/status/stream", get(status::status_stream))
        .route("/reinitialize", post(status::reinitialize))
}
