//! Service info, health and pipeline status endpoints

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{ActionResponse, StatusResponse};

/// GET / - Service info
pub async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "docqa",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering over uploaded PDF, Word and text documents",
        "endpoints": {
            "POST /upload": "Upload and index files (multipart)",
            "GET /files": "List indexed files",
            "DELETE /files/:filename": "Remove a file",
            "POST /clear-files": "Remove all files",
            "POST /query": "Ask a question",
            "GET /status": "Pipeline status",
            "GET /status/stream": "Pipeline status changes (server-sent events)",
            "POST /reinitialize": "Rebuild the index from stored files"
        }
    }))
}

/// GET /health - Liveness check
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "docqa",
    }))
}

/// GET /status - Pipeline status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.orchestrator().status())
}

/// GET /status/stream - One `status` event per state change
pub async fn status_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let orchestrator = state.orchestrator().clone();
    let changes = WatchStream::new(orchestrator.subscribe());

    let events = changes.map(move |_| {
        Event::default()
            .event("status")
            .json_data(orchestrator.status())
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /reinitialize - Rebuild the index from stored files
pub async fn reinitialize(State(state): State<AppState>) -> Result<Json<ActionResponse>> {
    let report = state.orchestrator().reinitialize().await?;

    let message = format!(
        "Indexed {} documents ({} chunks)",
        report.ingested.len(),
        report.chunks_indexed
    );

    if report.failed.is_empty() {
        Ok(Json(ActionResponse::success(message)))
    } else {
        Ok(Json(ActionResponse::warning(format!(
            "{}; failed: {}",
            message,
            report.failed_files().join(", ")
        ))))
    }
}
