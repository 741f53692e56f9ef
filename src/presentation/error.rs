// Mapping of ingest errors to HTTP responses
use crate::domain::error::IngestError;
use crate::infrastructure::http_response::json_response;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Body sent back for any rejected batch.
#[derive(Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

pub struct ApiError(IngestError);

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            IngestError::Parse(err) => {
                tracing::warn!(error = %err, "rejected malformed batch");
                (StatusCode::BAD_REQUEST, "server error".to_string())
            }
            err @ (IngestError::Validation(_) | IngestError::TimestampOutOfRange { .. }) => {
                tracing::warn!(error = %err, "rejected invalid batch");
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            err @ IngestError::WallClock => {
                tracing::error!(error = %err, "cannot stamp readings");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
        };

        json_response(status, &ErrorMessage { message })
    }
}
