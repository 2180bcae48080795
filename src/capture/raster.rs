// SPDX-License-Identifier: GPL-3.0-only

//! Off-screen raster surface shared by the poll loop and image uploads

use super::roi::RegionOfInterest;
use super::types::CameraFrame;
use image::{DynamicImage, RgbaImage};
use tracing::trace;

/// Reusable RGBA buffer frames are drawn into before decoding
///
/// The buffer is only reallocated when the drawn size changes, so a steady
/// camera stream reuses the same allocation every tick.
#[derive(Debug)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(0, 0),
        }
    }

    /// Current contents
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Draw a frame, cropped to `roi` when one is given
    ///
    /// A region that does not fit the frame is ignored and the full frame is
    /// drawn. Returns false (leaving the surface untouched) for frames whose
    /// data is shorter than their header claims.
    pub fn draw_frame(&mut self, frame: &CameraFrame, roi: Option<&RegionOfInterest>) -> bool {
        if !frame.is_complete() {
            return false;
        }

        let region = roi
            .filter(|r| r.fits(frame.size()))
            .copied()
            .unwrap_or(RegionOfInterest {
                x: 0,
                y: 0,
                width: frame.width,
                height: frame.height,
            });

        self.resize(region.width, region.height);

        let row_bytes = region.width as usize * 4;
        let stride = frame.stride as usize;
        let dst: &mut [u8] = &mut self.image;
        for row in 0..region.height as usize {
            let src_start = (region.y as usize + row) * stride + region.x as usize * 4;
            let dst_start = row * row_bytes;
            dst[dst_start..dst_start + row_bytes]
                .copy_from_slice(&frame.data[src_start..src_start + row_bytes]);
        }

        trace!(
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "Drew frame region"
        );
        true
    }

    /// Draw a decoded image at its natural size
    pub fn draw_image(&mut self, image: &DynamicImage) {
        let rgba = image.to_rgba8();
        self.resize(rgba.width(), rgba.height());
        self.image.copy_from_slice(rgba.as_raw());
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.width() != width || self.image.height() != height {
            self.image = RgbaImage::new(width, height);
        }
    }
}
