// Application layer - Use cases and the ports they depend on
pub mod clock;
pub mod ingest_service;
pub mod point_writer;
pub mod static_file_service;
