//! Object storage for uploaded files. Returned URLs are opaque to the rest of the service.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Empty file")]
    Empty,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Storage failure: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` and returns a stable URL for it.
    async fn put(&self, file_name: Option<&str>, bytes: &[u8]) -> Result<String, UploadError>;
}

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "pdf"];

/// Files on local disk, served back under `/uploads`.
pub struct LocalStorage { root: PathBuf, base_url: String }

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self { root: root.into(), base_url: base_url.into() }
    }
}

fn extension(file_name: Option<&str>) -> Result<String, UploadError> {
    let ext = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) { Ok(ext) } else { Err(UploadError::UnsupportedType(ext)) }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, file_name: Option<&str>, bytes: &[u8]) -> Result<String, UploadError> {
        if bytes.is_empty() { return Err(UploadError::Empty); }
        let ext = extension(file_name)?;
        let stored = format!("{}.{ext}", Uuid::now_v7());
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&stored), bytes).await?;
        tracing::info!(file = %stored, size = bytes.len(), "upload stored");
        Ok(format!("{}/uploads/{stored}", self.base_url))
    }
}
