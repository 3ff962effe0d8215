//! Keyed blob adapter scoped to gateway prefixes (spec.md §4.1). The core reads through
//! this trait only; it never touches a filesystem path directly.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::warn;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid path component: {0}")]
    InvalidPath(String),
    #[error("blob not found: {gateway}/{filename}")]
    NotFound { gateway: String, filename: String },
    #[error("blob store I/O error: {0}")]
    Io(String),
}

const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

fn validate_component(component: &str) -> BlobResult<()> {
    if component.is_empty() || component.contains("..") || component.contains('/') || component.contains('\\') {
        return Err(BlobError::InvalidPath(component.to_string()));
    }
    let mut chars = component.chars();
    let Some(first) = chars.next() else {
        return Err(BlobError::InvalidPath(component.to_string()));
    };
    if !first.is_ascii_alphanumeric() {
        return Err(BlobError::InvalidPath(component.to_string()));
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')) {
        return Err(BlobError::InvalidPath(component.to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, gateway: &str, filename: &str, bytes: &[u8]) -> BlobResult<PathBuf>;
    async fn read(&self, gateway: &str, filename: &str) -> BlobResult<Vec<u8>>;
    async fn list(&self, gateway: &str) -> BlobResult<Vec<String>>;
    async fn exists(&self, gateway: &str, filename: &str) -> BlobResult<bool>;
    async fn delete(&self, gateway: &str, filename: &str) -> BlobResult<bool>;
    async fn ensure_gateway_dir(&self, gateway: &str) -> BlobResult<()>;
    /// Writes a timestamped immutable copy under `{gateway}/archive/`. Best-effort: a
    /// failure here is logged and never propagated (spec.md §4.1).
    async fn archive(&self, gateway: &str, filename: &str, bytes: &[u8]);
}

/// Local-filesystem blob backend, rooted at a configured directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn gateway_dir(&self, gateway: &str) -> BlobResult<PathBuf> {
        validate_component(gateway)?;
        Ok(self.root.join(gateway))
    }

    fn resolved_path(&self, gateway: &str, filename: &str) -> BlobResult<PathBuf> {
        validate_component(gateway)?;
        validate_component(filename)?;
        let path = self.root.join(gateway).join(filename);
        let resolved_root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        if let Some(parent) = path.parent()
            && let Ok(resolved_parent) = parent.canonicalize()
            && !resolved_parent.starts_with(&resolved_root)
        {
            return Err(BlobError::InvalidPath(filename.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, gateway: &str, filename: &str, bytes: &[u8]) -> BlobResult<PathBuf> {
        self.ensure_gateway_dir(gateway).await?;
        let path = self.resolved_path(gateway, filename)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| BlobError::Io(err.to_string()))?;
        Ok(path)
    }

    async fn read(&self, gateway: &str, filename: &str) -> BlobResult<Vec<u8>> {
        let path = self.resolved_path(gateway, filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound {
                gateway: gateway.to_string(),
                filename: filename.to_string(),
            }),
            Err(err) => Err(BlobError::Io(err.to_string())),
        }
    }

    async fn list(&self, gateway: &str) -> BlobResult<Vec<String>> {
        let dir = self.gateway_dir(gateway)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(BlobError::Io(err.to_string())),
        };
        let mut filenames = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|err| BlobError::Io(err.to_string()))? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default().to_ascii_lowercase();
            if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                filenames.push(name.to_string());
            }
        }
        filenames.sort();
        Ok(filenames)
    }

    async fn exists(&self, gateway: &str, filename: &str) -> BlobResult<bool> {
        let path = self.resolved_path(gateway, filename)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, gateway: &str, filename: &str) -> BlobResult<bool> {
        let path = self.resolved_path(gateway, filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(BlobError::Io(err.to_string())),
        }
    }

    async fn ensure_gateway_dir(&self, gateway: &str) -> BlobResult<()> {
        let dir = self.gateway_dir(gateway)?;
        tokio::fs::create_dir_all(&dir).await.map_err(|err| BlobError::Io(err.to_string()))
    }

    async fn archive(&self, gateway: &str, filename: &str, bytes: &[u8]) {
        let Ok(dir) = self.gateway_dir(gateway).map(|dir| dir.join("archive")) else {
            warn!(gateway, filename, "skipped archive copy: invalid gateway name");
            return;
        };
        if let Err(err) = tokio::fs::create_dir_all(&dir).await {
            warn!(gateway, filename, error = %err, "failed to create archive directory");
            return;
        }
        let archived_name = format!("{}-{filename}", Utc::now().format("%Y%m%dT%H%M%S"));
        let path: &Path = &dir;
        if let Err(err) = tokio::fs::write(path.join(&archived_name), bytes).await {
            warn!(gateway, filename, error = %err, "failed to write archive copy");
        }
    }
}
