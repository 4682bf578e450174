//! Core image types.

use crate::error::{Result, StudioError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless, keeps transparency).
    #[default]
    Png,
    /// JPEG format (lossy, opaque).
    Jpeg,
    /// WebP format. Accepted as input only.
    WebP,
}

impl ImageFormat {
    /// Encodings a user can pick for edit results.
    pub const OUTPUT_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parses a MIME type string.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }

    /// Returns true if this encoding has no alpha channel.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// Returns true if edit results may be delivered in this encoding.
    pub fn is_output_format(&self) -> bool {
        Self::OUTPUT_FORMATS.contains(self)
    }

    pub(crate) fn codec(&self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::WebP => image::ImageFormat::WebP,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_mime_type(s)
            .or_else(|| Self::from_extension(s))
            .ok_or_else(|| StudioError::Decode(format!("unsupported image format: {s}")))
    }
}

/// An encoded image together with its self-contained data URL.
///
/// Immutable: edits produce a new asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    bytes: Vec<u8>,
    format: ImageFormat,
    data_url: String,
}

impl ImageAsset {
    /// Creates an asset from raw bytes in a known encoding.
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        let data_url = format!(
            "data:{};base64,{}",
            format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        Self {
            bytes,
            format,
            data_url,
        }
    }

    /// Creates an asset from base64 payload and MIME type as returned by the provider.
    pub fn from_base64(data: &str, mime_type: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| StudioError::Decode(e.to_string()))?;
        let format = ImageFormat::from_mime_type(mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&bytes))
            .ok_or_else(|| StudioError::Decode(format!("unsupported MIME type: {mime_type}")))?;
        Ok(Self::new(bytes, format))
    }

    /// Parses a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::Decode("not a data URL".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::Decode("data URL has no payload".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| StudioError::Decode("data URL is not base64 encoded".into()))?;
        Self::from_base64(payload, mime)
    }

    /// Reads an image file, detecting the encoding from content then extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let format = ImageFormat::from_magic_bytes(&bytes)
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(ImageFormat::from_extension)
            })
            .ok_or_else(|| {
                StudioError::Decode(format!("{} is not a supported image", path.display()))
            })?;
        Ok(Self::new(bytes, format))
    }

    /// Raw encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoding of [`bytes`](Self::bytes).
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Self-contained data URL for the asset.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Base64 payload of the data URL.
    pub fn to_base64(&self) -> &str {
        self.data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Returns this asset re-encoded as `target`.
    pub fn normalized(&self, target: ImageFormat) -> Result<Self> {
        if self.format == target {
            return Ok(self.clone());
        }
        let bytes = super::normalize::normalize(&self.bytes, self.format, target)?;
        Ok(Self::new(bytes, target))
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"hello"), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("image/png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("image/gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_output_formats() {
        assert!(ImageFormat::Png.is_output_format());
        assert!(ImageFormat::Jpeg.is_output_format());
        assert!(!ImageFormat::WebP.is_output_format());
        assert!(ImageFormat::Jpeg.is_opaque());
        assert!(!ImageFormat::Png.is_opaque());
    }

    #[test]
    fn test_data_url_matches_bytes() {
        let asset = ImageAsset::new(PNG_MAGIC.to_vec(), ImageFormat::Png);
        assert!(asset.data_url().starts_with("data:image/png;base64,"));
        assert_eq!(asset.to_base64(), "iVBORw0KGgoAAAAA");

        let parsed = ImageAsset::from_data_url(asset.data_url()).unwrap();
        assert_eq!(parsed, asset);
    }

    #[test]
    fn test_from_data_url_rejects_garbage() {
        assert!(ImageAsset::from_data_url("https://example.com/a.png").is_err());
        assert!(ImageAsset::from_data_url("data:image/png,plain").is_err());
        assert!(ImageAsset::from_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_from_base64_prefers_declared_mime() {
        let asset = ImageAsset::from_base64("/9j/4AAAAAAAAAAA", "image/jpeg").unwrap();
        assert_eq!(asset.format(), ImageFormat::Jpeg);
        assert_eq!(asset.size(), 12);
    }
}
