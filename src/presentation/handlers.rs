// HTTP request handlers
use crate::domain::error::StaticFileError;
use crate::infrastructure::http_response::{empty_response, file_response, json_response};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::Response,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

/// Acknowledgment for an ingested batch.
#[derive(Serialize)]
pub struct IngestAck {
    #[serde(rename = "DATA")]
    pub data: u64,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Ingest a JSON array of readings; any path accepts POST.
pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let receipt = state.ingest_service.ingest(&body).await?;
    Ok(json_response(
        StatusCode::OK,
        &IngestAck {
            data: receipt.count,
        },
    ))
}

/// Serve a file from the static root
pub async fn serve_static(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    match state.static_files.load(uri.path()).await {
        Ok(file) => file_response(file),
        Err(StaticFileError::Forbidden(path)) => {
            tracing::warn!(path = %path, "refused path outside the static root");
            empty_response(StatusCode::NOT_FOUND)
        }
        Err(StaticFileError::NotFound(_)) => empty_response(StatusCode::NOT_FOUND),
    }
}
