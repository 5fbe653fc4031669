//! Upload normalization
//!
//! Decodes an uploaded image, forces RGB, bounds its resolution and re-encodes
//! it as a JPEG data URL the model provider accepts inline.

use base64::{engine::general_purpose, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, RgbImage};
use tracing::debug;

use crate::config::ImageConfig;

pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Image pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("cannot encode image: {0}")]
    Encode(String),

    #[error("image worker failed: {0}")]
    Worker(String),
}

/// Converts raw uploads into bounded JPEG data URLs
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(ImageConfig::default())
    }
}

impl ImageNormalizer {
    pub fn new(config: ImageConfig) -> Self {
        Self {
            max_dimension: config.max_dimension.max(1),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    /// Normalize `bytes` into a `data:image/jpeg;base64,...` string.
    pub fn normalize(&self, bytes: &[u8]) -> Result<String, ImageError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
        let rgb = decoded.to_rgb8();

        let (width, height) = rgb.dimensions();
        let (target_w, target_h) = fit_within(width, height, self.max_dimension);
        let rgb = if (target_w, target_h) == (width, height) {
            rgb
        } else {
            debug!("Downscaling {}x{} to {}x{}", width, height, target_w, target_h);
            image::imageops::resize(&rgb, target_w, target_h, FilterType::Lanczos3)
        };

        let jpeg = self.encode_jpeg(&rgb)?;
        Ok(format!("{}{}", DATA_URL_PREFIX, general_purpose::STANDARD.encode(jpeg)))
    }

    /// Same as [`normalize`](Self::normalize), run on the blocking pool.
    pub async fn normalize_async(&self, bytes: bytes::Bytes) -> Result<String, ImageError> {
        let normalizer = *self;
        tokio::task::spawn_blocking(move || normalizer.normalize(&bytes))
            .await
            .map_err(|e| ImageError::Worker(e.to_string()))?
    }

    fn encode_jpeg(&self, rgb: &RgbImage) -> Result<Vec<u8>, ImageError> {
        let mut out = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
            encoder
                .encode_image(rgb)
                .map_err(|e| ImageError::Encode(e.to_string()))?;
        }
        Ok(out)
    }
}

/// Largest size with the same aspect ratio that fits in `max` x `max`.
/// Never upscales.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let scale = max as f64 / width.max(height) as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}
