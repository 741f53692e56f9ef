// Router assembly - GET serves files, POST ingests, on every path
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, ingest_batch, serve_static};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check).post(ingest_batch))
        .route("/", get(serve_static).post(ingest_batch))
        .route("/*path", get(serve_static).post(ingest_batch))
        // Batches are buffered whole, whatever their size.
        .layer(DefaultBodyLimit::disable())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
