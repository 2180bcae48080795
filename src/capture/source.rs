// SPDX-License-Identifier: GPL-3.0-only

//! Camera source abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │   CapturePipeline   │  ← start/stop, poll loop, preview
//! └──────────┬──────────┘
//!            │ open(request)
//!            ▼
//! ┌─────────────────────┐
//! │ CameraSource trait  │  ← device selection + acquisition
//! └──────────┬──────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ GStreamer       │  ← appsink delivering RGBA frames
//!   └─────────────────┘
//! ```

use super::types::{CameraDevice, CaptureResult, FrameReceiver, StreamRequest};
use futures::future::BoxFuture;

/// Control side of an acquired stream
pub trait StreamControl: Send + Sync {
    /// Human-readable device label
    fn label(&self) -> &str;

    /// Stop every track and release the device
    ///
    /// Implementations must tolerate repeated calls.
    fn stop(&mut self);
}

/// An acquired camera stream: frames plus the means to stop them
pub struct CaptureStream {
    pub frames: FrameReceiver,
    pub control: Box<dyn StreamControl>,
}

/// A platform camera
pub trait CameraSource: Send + Sync {
    /// Acquire a stream
    ///
    /// Fails with [`CaptureError`](crate::errors::CaptureError) when no device
    /// is present or access is refused.
    fn open(&self, request: &StreamRequest) -> BoxFuture<'static, CaptureResult<CaptureStream>>;

    /// Devices this source can open
    fn enumerate(&self) -> CaptureResult<Vec<CameraDevice>>;
}
