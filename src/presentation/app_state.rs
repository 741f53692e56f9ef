// Application state for HTTP handlers
use crate::application::ingest_service::IngestService;
use crate::application::static_file_service::StaticFileService;

#[derive(Clone)]
pub struct AppState {
    pub ingest_service: IngestService,
    pub static_files: StaticFileService,
}
