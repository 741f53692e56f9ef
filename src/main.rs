// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::application::clock::SystemClock;
use crate::application::ingest_service::IngestService;
use crate::application::point_writer::PointWriter;
use crate::application::static_file_service::StaticFileService;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::influx_writer::InfluxWriter;
use crate::presentation::app_state::AppState;
use crate::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Create writer (infrastructure layer)
    let writer = Arc::new(InfluxWriter::new(&config.influx));
    if !writer.is_ready().await {
        tracing::warn!(url = %config.influx.url, "InfluxDB is not ready; writes may fail");
    }

    // Create services (application layer)
    let ingest_service = IngestService::new(
        writer.clone(),
        Arc::new(SystemClock),
        config.ingest.device_time_unit,
        config.ingest.count_mode,
    );
    let static_files = StaticFileService::new(
        config.server.static_root.clone(),
        config.server.index_document.clone(),
    );

    // Create application state
    let state = Arc::new(AppState {
        ingest_service,
        static_files,
    });

    // Build router (presentation layer)
    let router = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.server.bind).await?;
    tracing::info!(
        addr = %config.server.bind,
        static_root = %config.server.static_root.display(),
        bucket = %config.influx.bucket,
        "telemetry relay listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = writer.flush().await {
        tracing::error!(error = %e, "final flush failed");
    }
    tracing::info!("telemetry relay stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
