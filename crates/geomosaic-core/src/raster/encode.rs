//! Tile encoding to PNG and JPEG using the `image` crate's encoders.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use super::Raster;
use crate::error::{MosaicError, Result};

/// Encoder settings for tile output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// PNG compression level (0-9); mapped onto the encoder's presets.
    pub png_compression: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            png_compression: 6,
        }
    }
}

/// Encode a raster in the format named by `file_type` (`png`, `jpg`/`jpeg`).
///
/// JPEG has no alpha channel, so transparent pixels are flattened.
pub fn encode_raster(raster: &Raster, file_type: &str, settings: &EncodeSettings) -> Result<Vec<u8>> {
    if raster.is_empty() {
        return Err(MosaicError::Codec(format!(
            "Invalid dimensions: {}x{}",
            raster.width, raster.height
        )));
    }
    let img = raster
        .to_dynamic_image()
        .ok_or_else(|| MosaicError::Codec("Pixel buffer does not match dimensions".to_string()))?;

    let mut buffer = Cursor::new(Vec::new());
    match file_type.to_ascii_lowercase().as_str() {
        "png" => {
            let compression = match settings.png_compression {
                0..=3 => CompressionType::Fast,
                4..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            let encoder =
                PngEncoder::new_with_quality(&mut buffer, compression, FilterType::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        "jpg" | "jpeg" => {
            let flat = if raster.bands == 1 {
                DynamicImage::ImageLuma8(img.to_luma8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            let encoder =
                JpegEncoder::new_with_quality(&mut buffer, settings.jpeg_quality.clamp(1, 100));
            flat.write_with_encoder(encoder)?;
        }
        other => {
            return Err(MosaicError::Codec(format!("Unsupported tile format: {other}")));
        }
    }

    Ok(buffer.into_inner())
}
