//! Re-encoding of generated images into the encoding the user picked.

use crate::error::{Result, StudioError};
use crate::image::types::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;

/// JPEG quality used for lossy targets (0.9 on a 0..1 scale).
pub const JPEG_QUALITY: u8 = 90;

/// Converts `bytes` from `from` to `to`.
///
/// Identical encodings return a byte-identical copy without decoding. Opaque
/// targets are composited over white so transparent areas do not turn black.
pub fn normalize(bytes: &[u8], from: ImageFormat, to: ImageFormat) -> Result<Vec<u8>> {
    if from == to {
        return Ok(bytes.to_vec());
    }

    let decoded = image::load_from_memory_with_format(bytes, from.codec())
        .map_err(|e| StudioError::Decode(format!("cannot read {from} image: {e}")))?;

    let mut out = Vec::new();
    if to.is_opaque() {
        let flattened = flatten_onto_white(&decoded);
        let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder
            .encode_image(&DynamicImage::ImageRgb8(flattened))
            .map_err(|e| StudioError::Decode(format!("cannot write {to} image: {e}")))?;
    } else {
        DynamicImage::ImageRgba8(decoded.to_rgba8())
            .write_to(&mut Cursor::new(&mut out), to.codec())
            .map_err(|e| StudioError::Decode(format!("cannot write {to} image: {e}")))?;
    }

    tracing::debug!(%from, %to, in_bytes = bytes.len(), out_bytes = out.len(), "normalized image");
    Ok(out)
}

/// Alpha-blends every pixel over opaque white.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}
