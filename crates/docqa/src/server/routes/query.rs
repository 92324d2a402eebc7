//! Question answering endpoint

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /query - Answer a question from the indexed documents
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let question = request
        .normalized()
        .ok_or_else(|| Error::InvalidRequest("question must not be empty".to_string()))?;

    tracing::info!("Query: \"{}\"", question);

    let answer = state.orchestrator().answer(question).await?;
    tracing::info!(
        "Answered in {}ms ({} sources, grounded: {})",
        answer.processing_time_ms,
        answer.citations.len(),
        answer.grounded
    );

    Ok(Json(QueryResponse::from(answer)))
}
