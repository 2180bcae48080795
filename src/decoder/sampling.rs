// SPDX-License-Identifier: GPL-3.0-only

//! Pixel-sampling QR decoder
//!
//! The raster is converted to grayscale, downscaled when larger than the
//! configured maximum, and handed to `rqrr` for grid detection and decoding.

use crate::constants::capture::SAMPLING_MAX_DIMENSION;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::{debug, trace};

/// A decoder that works on raw RGBA pixels
pub trait PixelDecoder: Send + Sync {
    fn decode(&self, image: &RgbaImage) -> Vec<String>;
}

/// `rqrr` backed sampling decoder
#[derive(Debug, Clone, Copy)]
pub struct RqrrDecoder {
    /// Maximum dimension for processing (larger rasters are downscaled)
    max_dimension: u32,
}

impl Default for RqrrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RqrrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: SAMPLING_MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl PixelDecoder for RqrrDecoder {
    fn decode(&self, image: &RgbaImage) -> Vec<String> {
        let start = std::time::Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let mut gray = imageops::grayscale(image);
        if let Some((w, h)) = scaled_dimensions(width, height, self.max_dimension) {
            gray = imageops::resize(&gray, w, h, FilterType::Triangle);
        }
        trace!(
            width = gray.width(),
            height = gray.height(),
            "Prepared grayscale raster"
        );

        let mut prepared = rqrr::PreparedImage::prepare(gray);
        let grids = prepared.detect_grids();

        let mut codes = Vec::with_capacity(grids.len());
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => codes.push(content),
                Err(e) => debug!(error = %e, "Failed to decode QR grid"),
            }
        }

        if !codes.is_empty() {
            debug!(
                count = codes.len(),
                total_ms = start.elapsed().as_millis(),
                "Sampling decoder found codes"
            );
        }
        codes
    }
}

/// Size to downscale to, or `None` when already within `max_dimension`
fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width <= max_dimension && height <= max_dimension {
        return None;
    }
    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let w = ((width as f32 / scale) as u32).max(1);
    let h = ((height as f32 / scale) as u32).max(1);
    Some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_raster_is_not_scaled() {
        assert_eq!(scaled_dimensions(640, 480, 640), None);
        assert_eq!(scaled_dimensions(16, 16, 640), None);
    }

    #[test]
    fn test_downscale_keeps_aspect_ratio() {
        assert_eq!(scaled_dimensions(1920, 1080, 640), Some((640, 360)));
        assert_eq!(scaled_dimensions(480, 1280, 640), Some((240, 640)));
    }

    #[test]
    fn test_blank_raster_has_no_codes() {
        let decoder = RqrrDecoder::new();
        let blank = RgbaImage::from_pixel(64, 64, image::Rgba([255, 255, 255, 255]));
        assert!(decoder.decode(&blank).is_empty());
        assert!(decoder.decode(&RgbaImage::new(0, 0)).is_empty());
    }
}
