// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture
//!
//! Device acquisition through [`CameraSource`], the per-frame poll loop,
//! region-of-interest cropping, and the raster surface decoders read from.

pub mod gst_source;
pub mod pipeline;
pub mod poll_loop;
pub mod raster;
pub mod roi;
pub mod scanner;
pub mod source;
pub mod types;

pub use gst_source::{GstCameraSource, enumerate_cameras};
pub use pipeline::{CaptureHandle, CapturePipeline};
pub use poll_loop::{DetectionSink, PreviewReceiver};
pub use raster::RasterSurface;
pub use roi::{
    LayoutProbe, NoLayout, RegionOfInterest, Roi, ScreenRect, SharedLayout, ViewportLayout,
    compute_region_of_interest,
};
pub use scanner::{FrameScanner, SharedScanner};
pub use source::{CameraSource, CaptureStream, StreamControl};
pub use types::{
    CameraDevice, CameraFrame, CaptureResult, FacingMode, StreamRequest, VideoSize, select_device,
};
