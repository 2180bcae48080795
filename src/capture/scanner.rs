// SPDX-License-Identifier: GPL-3.0-only

//! Raster surface plus decoder, shared by the poll loop and image uploads

use super::raster::RasterSurface;
use super::roi::Roi;
use super::types::CameraFrame;
use crate::decoder::{DecoderAdapter, DecoderKind};
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The one scanner in a session
///
/// Holding the lock is what makes a decode exclusive: the camera poll loop
/// and the upload path never draw into the surface at the same time.
pub type SharedScanner = Arc<Mutex<FrameScanner>>;

#[derive(Debug)]
pub struct FrameScanner {
    surface: RasterSurface,
    decoder: DecoderAdapter,
}

impl FrameScanner {
    pub fn new(decoder: DecoderAdapter) -> Self {
        Self {
            surface: RasterSurface::new(),
            decoder,
        }
    }

    pub fn shared(self) -> SharedScanner {
        Arc::new(Mutex::new(self))
    }

    pub fn decoder_kind(&self) -> DecoderKind {
        self.decoder.kind()
    }

    /// Draw the region (or the full frame) and decode it
    pub async fn scan_frame(&mut self, frame: &CameraFrame, roi: Roi) -> Vec<String> {
        let region = match roi {
            Roi::Ready(region) => Some(region),
            Roi::NotReady => None,
        };
        if !self.surface.draw_frame(frame, region.as_ref()) {
            return Vec::new();
        }

        let cropped = region.is_some_and(|r| r.fits(frame.size()));
        let full_frame = if cropped { None } else { Some(frame) };
        self.decoder.detect(full_frame, self.surface.image()).await
    }

    /// Draw an uploaded image at its natural size and decode it
    pub async fn scan_image(&mut self, image: &DynamicImage) -> Vec<String> {
        self.surface.draw_image(image);
        if self.surface.is_empty() {
            return Vec::new();
        }
        self.decoder.detect(None, self.surface.image()).await
    }
}
