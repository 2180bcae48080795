// SPDX-License-Identifier: GPL-3.0-only

//! Capture lifecycle: one live camera stream and its poll loop at a time

use super::poll_loop::{DetectionSink, PollContext, PollLoop, PreviewReceiver, PreviewSender};
use super::roi::LayoutProbe;
use super::scanner::SharedScanner;
use super::source::{CameraSource, StreamControl};
use super::types::{CaptureResult, StreamRequest};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A live camera stream plus the loop polling it
pub struct CaptureHandle {
    control: Box<dyn StreamControl>,
    poll: PollLoop,
}

impl CaptureHandle {
    pub fn label(&self) -> &str {
        self.control.label()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.poll.cancel();
        self.control.stop();
    }
}

/// Owns the camera for the session
///
/// `start` acquires a stream and spawns the poll loop; `stop` cancels the
/// loop and releases every track. Both are idempotent.
pub struct CapturePipeline {
    source: Arc<dyn CameraSource>,
    request: StreamRequest,
    scanner: SharedScanner,
    layout: Arc<dyn LayoutProbe>,
    sink: Arc<dyn DetectionSink>,
    preview: PreviewSender,
    handle: Option<CaptureHandle>,
}

impl CapturePipeline {
    pub fn new(
        source: Arc<dyn CameraSource>,
        request: StreamRequest,
        scanner: SharedScanner,
        layout: Arc<dyn LayoutProbe>,
        sink: Arc<dyn DetectionSink>,
    ) -> Self {
        let (preview, _) = watch::channel(None);
        Self {
            source,
            request,
            scanner,
            layout,
            sink,
            preview,
            handle: None,
        }
    }

    /// Subscribe to preview frames (None while idle)
    pub fn preview(&self) -> PreviewReceiver {
        self.preview.subscribe()
    }

    pub fn scanner(&self) -> &SharedScanner {
        &self.scanner
    }

    /// Whether a camera stream is held
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether the held stream is still being polled
    ///
    /// False once the loop has delivered a detection or seen its stream close.
    pub fn is_polling(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.poll.is_active())
    }

    /// Label of the live device
    pub fn device_label(&self) -> Option<&str> {
        self.handle.as_ref().map(CaptureHandle::label)
    }

    /// Acquire the camera and begin polling
    ///
    /// A second call while already live is a no-op. On failure the pipeline
    /// stays idle and the error is returned for the UI to offer a retry.
    pub async fn start(&mut self) -> CaptureResult<()> {
        if self.handle.is_some() {
            debug!("Capture already running");
            return Ok(());
        }

        let stream = match self.source.open(&self.request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Camera acquisition failed");
                return Err(e);
            }
        };

        let poll = PollLoop::spawn(PollContext {
            frames: stream.frames,
            scanner: Arc::clone(&self.scanner),
            layout: Arc::clone(&self.layout),
            preview: self.preview.clone(),
            sink: Arc::clone(&self.sink),
        });

        info!(device = stream.control.label(), "Capture started");
        self.handle = Some(CaptureHandle {
            control: stream.control,
            poll,
        });
        Ok(())
    }

    /// Cancel polling and release the camera; a no-op when idle
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        info!(device = handle.label(), "Stopping capture");
        drop(handle);
        self.preview.send_replace(None);
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
