// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame detection loop
//!
//! One tick per delivered frame: drain to the newest frame, publish it for
//! preview, map the viewfinder to a region of interest, decode. The loop
//! checks its activity flag before and after each decode so a `stop()` that
//! lands mid-decode suppresses the result. On the first hit it clears the
//! flag, reports the code, and exits. A stream that closes while the loop is
//! still active is reported as lost.

use super::roi::{LayoutProbe, compute_region_of_interest};
use super::scanner::SharedScanner;
use super::types::{CameraFrame, FrameReceiver};
use crate::errors::CaptureError;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Latest frame shown by the preview
pub type PreviewSender = watch::Sender<Option<Arc<CameraFrame>>>;
pub type PreviewReceiver = watch::Receiver<Option<Arc<CameraFrame>>>;

/// Receives what the poll loop finds
pub trait DetectionSink: Send + Sync {
    fn detected(&self, code: String);

    /// The device stopped delivering frames before anyone cancelled the loop
    fn stream_lost(&self, error: CaptureError);
}

/// Everything a running loop reads from or writes to
pub struct PollContext {
    pub frames: FrameReceiver,
    pub scanner: SharedScanner,
    pub layout: Arc<dyn LayoutProbe>,
    pub preview: PreviewSender,
    pub sink: Arc<dyn DetectionSink>,
}

/// Handle to a running poll loop
pub struct PollLoop {
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollLoop {
    pub fn spawn(context: PollContext) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);
        let task = tokio::spawn(run(context, flag));
        Self {
            active,
            task: Some(task),
        }
    }

    /// Whether the loop may still report a detection
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Prevent any further work; idempotent
    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(mut context: PollContext, active: Arc<AtomicBool>) {
    debug!("Poll loop started");
    let mut ticks: u64 = 0;

    loop {
        let Some(mut frame) = context.frames.next().await else {
            if active.swap(false, Ordering::SeqCst) {
                warn!(ticks, "Camera stream closed");
                context.sink.stream_lost(CaptureError::StreamEnded);
            }
            break;
        };
        // Only the newest frame is worth decoding
        while let Some(Some(newer)) = context.frames.next().now_or_never() {
            frame = newer;
        }
        if !active.load(Ordering::SeqCst) {
            break;
        }
        ticks += 1;

        let frame = Arc::new(frame);
        context.preview.send_replace(Some(Arc::clone(&frame)));

        let layout = context.layout.layout();
        let roi = compute_region_of_interest(Some(frame.size()), layout.as_ref());
        let codes = {
            let mut scanner = context.scanner.lock().await;
            scanner.scan_frame(&frame, roi).await
        };

        if !active.load(Ordering::SeqCst) {
            break;
        }
        if let Some(code) = codes.into_iter().next() {
            active.store(false, Ordering::SeqCst);
            info!(ticks, roi = ?roi, "Camera detection");
            context.sink.detected(code);
            break;
        }
    }

    debug!(ticks, "Poll loop exited");
}
