// HTTP response utilities for JSON acknowledgments and static files
use crate::application::static_file_service::{StaticFile, content_type_for};
use axum::{
    body::Body,
    http::{HeaderValue, Response, StatusCode, header},
};
use serde::Serialize;

/// Serialize `payload` as a compact JSON body.
pub fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<Body> {
    match serde_json::to_vec(payload) {
        Ok(body) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Body::from(body))
            .unwrap_or_else(|e| internal_error(&e)),
        Err(e) => internal_error(&e),
    }
}

/// Raw file bytes with a content type guessed from the extension.
pub fn file_response(file: StaticFile) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type_for(&file.path)),
        )
        .body(Body::from(file.contents))
        .unwrap_or_else(|e| internal_error(&e))
}

/// Status with an empty body
pub fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn internal_error(err: &dyn std::fmt::Display) -> Response<Body> {
    tracing::error!(error = %err, "response build error");
    empty_response(StatusCode::INTERNAL_SERVER_ERROR)
}
