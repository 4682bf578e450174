//! Locally materialized copies of downloaded results.

use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A downloaded result written to a private temporary file.
///
/// The file lives exactly as long as the handle: dropping it deletes the file.
#[derive(Debug)]
pub struct AssetHandle {
    file: NamedTempFile,
    mime_type: String,
    size: usize,
}

impl AssetHandle {
    /// Writes `bytes` to a fresh temporary file.
    pub fn materialize(bytes: &[u8], mime_type: impl Into<String>) -> Result<Self> {
        let mime_type = mime_type.into();
        let suffix = match mime_type.as_str() {
            "video/mp4" => ".mp4",
            "video/webm" => ".webm",
            "image/png" => ".png",
            "image/jpeg" => ".jpg",
            _ => ".bin",
        };
        let mut file = tempfile::Builder::new()
            .prefix("genstudio-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), size = bytes.len(), "materialized asset");
        Ok(Self {
            file,
            mime_type,
            size: bytes.len(),
        })
    }

    /// Location of the materialized bytes.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// `file://` URL for players that want a URL.
    pub fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }

    /// MIME type of the content.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copies the content to `dest`; the handle keeps its own copy.
    pub fn save(&self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        std::fs::copy(self.path(), dest)?;
        Ok(dest.to_path_buf())
    }
}

impl Drop for AssetHandle {
    fn drop(&mut self) {
        tracing::debug!(path = %self.file.path().display(), "released asset");
    }
}

/// Holds at most one displayed asset and releases it on replacement.
#[derive(Debug, Default)]
pub struct AssetSlot {
    current: Option<AssetHandle>,
}

impl AssetSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle`, releasing the previous one first.
    pub fn replace(&mut self, handle: AssetHandle) -> &AssetHandle {
        self.release();
        self.current.insert(handle)
    }

    /// Releases the current asset, if any.
    pub fn release(&mut self) {
        drop(self.current.take());
    }

    /// The asset on display.
    pub fn current(&self) -> Option<&AssetHandle> {
        self.current.as_ref()
    }

    /// Returns true if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
