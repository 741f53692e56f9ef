// Static file service - Serves files below a fixed root
use crate::domain::error::StaticFileError;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StaticFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StaticFileService {
    root: PathBuf,
    index_document: String,
}

impl StaticFileService {
    pub fn new(root: impl Into<PathBuf>, index_document: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index_document: index_document.into(),
        }
    }

    /// Read the file a (still percent-encoded) request path points at.
    ///
    /// Symlinks are followed, but only to targets that stay inside the root.
    pub async fn load(&self, request_path: &str) -> Result<StaticFile, StaticFileError> {
        let path = self.resolve(request_path)?;
        let not_found = |e: std::io::Error| {
            tracing::debug!(path = %path.display(), error = %e, "static file unavailable");
            StaticFileError::NotFound(request_path.to_string())
        };

        let target = tokio::fs::canonicalize(&path).await.map_err(not_found)?;
        let root = tokio::fs::canonicalize(&self.root).await.map_err(not_found)?;
        if !target.starts_with(&root) {
            return Err(StaticFileError::Forbidden(request_path.to_string()));
        }

        let contents = tokio::fs::read(&target).await.map_err(not_found)?;
        Ok(StaticFile { path, contents })
    }

    /// Map a request path onto the filesystem, refusing anything that
    /// would land outside the serving root.
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, StaticFileError> {
        if request_path.is_empty() || request_path == "/" {
            return Ok(self.root.join(&self.index_document));
        }

        let decoded = urlencoding::decode(request_path)
            .map_err(|_| StaticFileError::NotFound(request_path.to_string()))?;
        let relative = decoded.trim_start_matches('/');
        if relative.contains('\\') || relative.contains('\0') {
            return Err(StaticFileError::Forbidden(decoded.to_string()));
        }

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StaticFileError::Forbidden(decoded.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

/// Content type for a served file, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
