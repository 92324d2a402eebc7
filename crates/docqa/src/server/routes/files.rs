//! Upload and file management endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::sanitize_filename;
use crate::types::{
    ActionResponse, FileInfo, FileListResponse, SourceDocument, UploadResponse,
};

/// POST /upload - Upload and index files
///
/// Every multipart field that carries a filename is treated as a document.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let Some(filename) = sanitize_filename(&raw_name) else {
            tracing::warn!("Ignoring upload with unusable name '{}'", raw_name);
            continue;
        };

        let data = field.bytes().await.map_err(|e| {
            Error::InvalidRequest(format!("Failed to read file '{}': {}", filename, e))
        })?;

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        documents.push(SourceDocument::new(filename, data));
    }

    if documents.is_empty() {
        return Err(Error::InvalidRequest("No files provided".to_string()));
    }

    let report = state.orchestrator().ingest(documents).await?;
    Ok(Json(UploadResponse::from(&report)))
}

/// GET /files - List indexed files
pub async fn list_files(State(state): State<AppState>) -> Json<FileListResponse> {
    let files = state
        .orchestrator()
        .documents()
        .iter()
        .map(FileInfo::from)
        .collect();

    Json(FileListResponse { files })
}

/// DELETE /files/:filename - Remove one file
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ActionResponse>> {
    let chunks = state.orchestrator().delete_document(&filename).await?;
    Ok(Json(ActionResponse::success(format!(
        "Deleted {} ({} chunks removed)",
        filename, chunks
    ))))
}

/// POST /clear-files - Remove every file
pub async fn clear_files(State(state): State<AppState>) -> Result<Json<ActionResponse>> {
    let count = state.orchestrator().clear().await?;
    Ok(Json(ActionResponse::success(format!(
        "Cleared {} files",
        count
    ))))
}
