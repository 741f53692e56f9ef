// Domain errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The body is not syntactically valid JSON.
    #[error("malformed request body: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("reading {index} has a timestamp outside the representable range")]
    TimestampOutOfRange { index: usize },

    /// The server's own clock cannot be turned into a point timestamp.
    #[error("wall clock is outside the representable range")]
    WallClock,
}

impl IngestError {
    pub fn invalid_reading(index: usize, err: serde_json::Error) -> Self {
        Self::Validation(format!("invalid reading at index {index}: {err}"))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StaticFileError {
    /// The decoded path tries to leave the serving root.
    #[error("path escapes the serving root: {0}")]
    Forbidden(String),

    #[error("file not found: {0}")]
    NotFound(String),
}
