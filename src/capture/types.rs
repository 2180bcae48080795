// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera capture

use crate::errors::CaptureError;
use futures::channel::mpsc;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Channel end used by capture devices to deliver frames
pub type FrameSender = mpsc::Sender<CameraFrame>;

/// Channel end consumed by the poll loop
pub type FrameReceiver = mpsc::Receiver<CameraFrame>;

/// A single RGBA video frame
///
/// Rows may carry padding: `stride` is the number of bytes per row.
#[derive(Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub stride: u32,
    /// When the frame left the capture device
    pub captured_at: Instant,
}

impl std::fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl CameraFrame {
    /// Build a frame from tightly packed RGBA bytes
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    pub fn from_image(image: &RgbaImage) -> Self {
        Self::from_rgba(image.width(), image.height(), image.as_raw().clone())
    }

    pub fn size(&self) -> VideoSize {
        VideoSize {
            width: self.width,
            height: self.height,
        }
    }

    /// Whether `data` covers every row the header claims
    pub fn is_complete(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let needed =
            (self.stride as usize) * (self.height as usize - 1) + (self.width as usize) * 4;
        self.stride >= self.width * 4 && self.data.len() >= needed
    }

    /// RGBA value at (x, y), clamped to the frame
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = (y * self.stride + x * 4) as usize;
        match self.data.get(idx..idx + 4) {
            Some(px) => [px[0], px[1], px[2], px[3]],
            None => [0, 0, 0, 255],
        }
    }
}

/// Native video dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

/// Which way the camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera pointing at the package
    #[default]
    Environment,
    /// Front camera pointing at the operator
    User,
}

/// A capture device as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Platform object path (PipeWire object path or V4L2 device node)
    pub path: String,
    /// Mount location: "front", "back" or "external"
    pub location: Option<String>,
}

/// What the session asks of the camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    /// Explicit device name or path; overrides the facing preference
    pub device: Option<String>,
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            device: None,
        }
    }
}

/// Pick a device for a request
///
/// A configured device that matches by name or path wins. Otherwise devices
/// are ranked by location against the facing preference; ties keep
/// enumeration order.
pub fn select_device(devices: &[CameraDevice], request: &StreamRequest) -> Option<usize> {
    if let Some(wanted) = request.device.as_deref()
        && let Some(index) = devices
            .iter()
            .position(|d| d.name == wanted || d.path == wanted)
    {
        return Some(index);
    }

    let rank = |device: &CameraDevice| -> u8 {
        let location = device.location.as_deref().unwrap_or("");
        match (request.facing, location) {
            (FacingMode::Environment, "back") => 0,
            (FacingMode::Environment, "external") => 1,
            (FacingMode::Environment, "front") => 3,
            (FacingMode::User, "front") => 0,
            (FacingMode::User, "external") => 1,
            (FacingMode::User, "back") => 3,
            _ => 2,
        }
    };

    devices
        .iter()
        .enumerate()
        .min_by_key(|(_, device)| rank(device))
        .map(|(index, _)| index)
}
