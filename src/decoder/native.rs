// SPDX-License-Identifier: GPL-3.0-only

//! Platform barcode detector seam

use crate::capture::types::CameraFrame;
use crate::errors::DecodeError;
use futures::future::BoxFuture;
use image::RgbaImage;

/// What a native detector reads from
#[derive(Debug, Clone, Copy)]
pub enum FrameSource<'a> {
    /// The full video frame, rows possibly padded
    Frame(&'a CameraFrame),
    /// The cropped raster surface
    Raster(&'a RgbaImage),
}

impl FrameSource<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            FrameSource::Frame(frame) => (frame.width, frame.height),
            FrameSource::Raster(image) => image.dimensions(),
        }
    }

    /// Tightly packed RGBA bytes
    pub fn to_packed_rgba(&self) -> Vec<u8> {
        match self {
            FrameSource::Raster(image) => image.as_raw().clone(),
            FrameSource::Frame(frame) => {
                let row_bytes = frame.width as usize * 4;
                let stride = frame.stride as usize;
                let mut packed = Vec::with_capacity(row_bytes * frame.height as usize);
                for row in 0..frame.height as usize {
                    let start = row * stride;
                    if let Some(bytes) = frame.data.get(start..start + row_bytes) {
                        packed.extend_from_slice(bytes);
                    }
                }
                packed
            }
        }
    }
}

/// A barcode detector provided by the platform
pub trait NativeDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Decoded payloads in the source, empty on a miss
    ///
    /// An `Err` means the detector itself broke and should not be used again.
    fn detect<'a>(&'a self, source: FrameSource<'a>)
    -> BoxFuture<'a, Result<Vec<String>, DecodeError>>;
}

/// Construction probe for a native detector
pub trait NativeDetectorFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn NativeDetector>, DecodeError>;
}

/// Factory for builds without any native detector
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableFactory;

impl NativeDetectorFactory for UnavailableFactory {
    fn create(&self) -> Result<Box<dyn NativeDetector>, DecodeError> {
        Err(DecodeError::Unavailable(
            "no native barcode detector compiled in".to_string(),
        ))
    }
}
