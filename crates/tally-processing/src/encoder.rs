//! Adaptive image encoder.
//!
//! Pure transformation: decode, downscale so the longest edge fits the cap
//! (never upscale), re-encode as JPEG at the requested quality. Compression
//! is an optimization, not a correctness requirement: any decode or encode
//! failure degrades to the original bytes, and the result is never larger
//! than the input.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;
use tally_core::constants::UNCOMPRESSED_RASTER_TYPES;

/// Result of an encode pass.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub data: Vec<u8>,
    pub compressed: bool,
    /// Content type of `data`: "image/jpeg" when compressed, the original
    /// type otherwise.
    pub content_type: String,
}

/// Whether the upload pipeline should route this payload through the encoder.
pub fn should_compress(size: usize, content_type: &str, threshold: usize) -> bool {
    size > threshold || UNCOMPRESSED_RASTER_TYPES.contains(&content_type)
}

/// Select a resampling filter by downscale ratio: cheap filters for heavy
/// reductions, Lanczos near 1:1.
fn select_filter(orig: u32, target: u32) -> FilterType {
    let ratio = orig as f32 / target.max(1) as f32;
    if ratio > 2.0 {
        FilterType::Triangle
    } else if ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

fn try_encode(data: &[u8], quality: f32, max_dimension: u32) -> anyhow::Result<Vec<u8>> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let img = reader.decode()?;

    let (width, height) = img.dimensions();
    let longest = width.max(height);

    let img: DynamicImage = if longest > max_dimension {
        let scale = max_dimension as f32 / longest as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        img.resize(new_width, new_height, select_filter(longest, max_dimension))
    } else {
        img
    };

    let quality = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    // JPEG has no alpha channel
    img.to_rgb8().write_with_encoder(encoder)?;

    Ok(out)
}

/// Encode a file for transmission.
///
/// `quality` is in `(0, 1]`; `max_dimension` caps the longest edge. Returns
/// the original bytes unchanged on decode failure or when re-encoding does
/// not actually shrink the payload.
pub fn encode(data: &[u8], content_type: &str, quality: f32, max_dimension: u32) -> EncodeOutcome {
    match try_encode(data, quality, max_dimension) {
        Ok(encoded) if encoded.len() < data.len() => EncodeOutcome {
            data: encoded,
            compressed: true,
            content_type: "image/jpeg".to_string(),
        },
        Ok(encoded) => {
            tracing::debug!(
                original_size = data.len(),
                encoded_size = encoded.len(),
                "Re-encode did not shrink payload, keeping original bytes"
            );
            EncodeOutcome {
                data: data.to_vec(),
                compressed: false,
                content_type: content_type.to_string(),
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                size_bytes = data.len(),
                "Image decode failed, falling back to original bytes"
            );
            EncodeOutcome {
                data: data.to_vec(),
                compressed: false,
                content_type: content_type.to_string(),
            }
        }
    }
}
