//! Uploaded media storage.
//!
//! DESIGN
//! ======
//! Files are content-addressed: the stored name is the SHA-256 of the bytes
//! plus the normalized extension, so re-uploading the same image is a no-op
//! and URLs never go stale. Only image and video extensions a kiosk browser
//! can render are accepted. The filesystem store's directory is served at
//! the public base URL by `tower_http::services::ServeDir`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::content::MediaKind;
use crate::services::session::bytes_to_hex;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("empty upload")]
    Empty,
    #[error("file too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl crate::frame::ErrorCode for MediaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_MEDIA_EMPTY",
            Self::TooLarge { .. } => "E_MEDIA_TOO_LARGE",
            Self::UnsupportedType(_) => "E_MEDIA_TYPE",
            Self::Io(_) => "E_MEDIA_IO",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMedia {
    pub name: String,
    pub url: String,
    pub kind: MediaKind,
    pub size: usize,
}

#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` uploaded under `file_name` and return its public location.
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError>;

    /// Directory to serve publicly, if the store is filesystem backed.
    fn serve_dir(&self) -> Option<&Path>;

    fn base_url(&self) -> &str;
}

/// Classify an upload by extension. Returns the lowercased extension.
#[must_use]
pub fn classify(file_name: &str) -> Option<(String, MediaKind)> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.trim().to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Some((ext, MediaKind::Image));
    }
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Some((ext, MediaKind::Video));
    }
    None
}

#[must_use]
pub fn content_name(bytes: &[u8], ext: &str) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}.{ext}", bytes_to_hex(&digest))
}

// =============================================================================
// FILESYSTEM STORE
// =============================================================================

pub struct FsMediaStore {
    dir: PathBuf,
    base_url: String,
    max_bytes: usize,
}

impl FsMediaStore {
    #[must_use]
    pub fn new(dir: PathBuf, base_url: String, max_bytes: usize) -> Self {
        Self { dir, base_url: base_url.trim_end_matches('/').to_owned(), max_bytes }
    }
}

#[async_trait::async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge { size: bytes.len(), max: self.max_bytes });
        }
        let (ext, kind) = classify(file_name).ok_or_else(|| MediaError::UnsupportedType(file_name.to_owned()))?;

        let name = content_name(bytes, &ext);
        let path = self.dir.join(&name);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(%name, "media already stored");
        } else {
            tokio::fs::create_dir_all(&self.dir).await?;
            // Write to a temp name first so readers never see a partial file.
            let tmp = self.dir.join(format!(".{name}.partial"));
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
            tracing::info!(%name, size = bytes.len(), "media stored");
        }

        Ok(StoredMedia { url: format!("{}/{name}", self.base_url), name, kind, size: bytes.len() })
    }

    fn serve_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;
