// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera source
//!
//! Devices are discovered through a `DeviceMonitor` filtered to raw video
//! sources. The chosen device feeds `videoconvert` and an RGBA appsink whose
//! callback pushes frames into the poll loop's channel. Once playing, a bus
//! error or end-of-stream closes that channel so the poll loop sees the
//! stream end.

use super::source::{CameraSource, CaptureStream, StreamControl};
use super::types::{
    CameraDevice, CameraFrame, CaptureResult, FrameSender, StreamRequest, select_device,
};
use crate::constants::capture::{
    FRAME_CHANNEL_CAPACITY, FRAME_LOG_INTERVAL, MAX_BUFFERS, START_TIMEOUT_SECS, STOP_TIMEOUT_SECS,
};
use crate::errors::CaptureError;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use gstreamer_video::VideoInfo;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Camera source backed by the GStreamer device monitor
#[derive(Debug, Clone, Copy, Default)]
pub struct GstCameraSource;

impl GstCameraSource {
    pub fn new() -> Self {
        Self
    }
}

impl CameraSource for GstCameraSource {
    fn open(&self, request: &StreamRequest) -> BoxFuture<'static, CaptureResult<CaptureStream>> {
        let request = request.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || open_blocking(&request))
                .await
                .map_err(|e| CaptureError::InitializationFailed(format!("open task failed: {}", e)))?
        })
    }

    fn enumerate(&self) -> CaptureResult<Vec<CameraDevice>> {
        Ok(monitor_devices()?
            .into_iter()
            .map(|(info, _)| info)
            .collect())
    }
}

/// List cameras visible to GStreamer
pub fn enumerate_cameras() -> CaptureResult<Vec<CameraDevice>> {
    GstCameraSource.enumerate()
}

fn monitor_devices() -> CaptureResult<Vec<(CameraDevice, gstreamer::Device)>> {
    gstreamer::init().map_err(|e| CaptureError::InitializationFailed(e.to_string()))?;

    let monitor = gstreamer::DeviceMonitor::new();
    let caps = gstreamer::Caps::new_empty_simple("video/x-raw");
    monitor.add_filter(Some("Video/Source"), Some(&caps));
    monitor
        .start()
        .map_err(|e| CaptureError::InitializationFailed(format!("device monitor: {}", e)))?;
    let devices = monitor.devices();
    monitor.stop();

    let found: Vec<_> = devices
        .into_iter()
        .map(|device| (describe(&device), device))
        .collect();
    debug!(count = found.len(), "Enumerated video sources");
    Ok(found)
}

fn describe(device: &gstreamer::Device) -> CameraDevice {
    let properties = device.properties();
    let property = |key: &str| -> Option<String> {
        properties
            .as_ref()
            .and_then(|props| props.get::<String>(key).ok())
    };

    CameraDevice {
        name: device.display_name().to_string(),
        path: property("object.path")
            .or_else(|| property("api.v4l2.path"))
            .or_else(|| property("device.path"))
            .unwrap_or_default(),
        location: property("api.libcamera.location"),
    }
}

fn open_blocking(request: &StreamRequest) -> CaptureResult<CaptureStream> {
    let devices = monitor_devices()?;
    let infos: Vec<CameraDevice> = devices.iter().map(|(info, _)| info.clone()).collect();
    let index = select_device(&infos, request).ok_or(CaptureError::NoDevice)?;
    let (info, device) = &devices[index];

    info!(
        device = %info.name,
        path = %info.path,
        location = ?info.location,
        "Opening camera"
    );

    let init_failed = |what: &str, e: &dyn std::fmt::Display| {
        CaptureError::InitializationFailed(format!("{}: {}", what, e))
    };

    let source = device
        .create_element(Some("camera-source"))
        .map_err(|e| init_failed("Failed to create camera element", &e))?;
    let convert = gstreamer::ElementFactory::make("videoconvert")
        .build()
        .map_err(|e| init_failed("Failed to create videoconvert", &e))?;
    let appsink = AppSink::builder()
        .caps(
            &gstreamer_video::VideoCapsBuilder::new()
                .format(gstreamer_video::VideoFormat::Rgba)
                .build(),
        )
        .max_buffers(MAX_BUFFERS)
        .drop(true)
        .build();
    appsink.set_property("sync", false);
    appsink.set_property("enable-last-sample", false);

    let pipeline = gstreamer::Pipeline::with_name("paxibox-capture");
    pipeline
        .add_many([&source, &convert, appsink.upcast_ref()])
        .map_err(|e| init_failed("Failed to assemble pipeline", &e))?;
    gstreamer::Element::link_many([&source, &convert, appsink.upcast_ref()])
        .map_err(|e| init_failed("Failed to link pipeline", &e))?;

    let (sender, receiver) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    appsink.set_callbacks(frame_callbacks(sender.clone()));

    if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
        let err = startup_error(&pipeline, e.to_string());
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(err);
    }

    let (result, state, pending) =
        pipeline.state(gstreamer::ClockTime::from_seconds(START_TIMEOUT_SECS));
    debug!(result = ?result, state = ?state, pending = ?pending, "Capture pipeline state");
    if let Err(e) = result {
        let err = startup_error(&pipeline, e.to_string());
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(err);
    }
    if state != gstreamer::State::Playing {
        warn!("Capture pipeline is not in PLAYING state yet");
    }

    watch_bus(&pipeline, sender);

    info!(device = %info.name, "Camera stream started");
    Ok(CaptureStream {
        frames: receiver,
        control: Box::new(GstStream {
            label: info.name.clone(),
            pipeline: Some(pipeline),
            appsink,
        }),
    })
}

fn frame_callbacks(sender: FrameSender) -> AppSinkCallbacks {
    let counter = Arc::new(AtomicU64::new(0));

    AppSinkCallbacks::builder()
        .new_sample(move |appsink| {
            let captured_at = Instant::now();
            let frame_num = counter.fetch_add(1, Ordering::Relaxed);

            let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
            let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
            if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                debug!(frame = frame_num, "Skipping corrupted buffer");
                return Ok(gstreamer::FlowSuccess::Ok);
            }

            let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
            let video_info = VideoInfo::from_caps(caps).map_err(|e| {
                error!(frame = frame_num, error = ?e, "Failed to read video info");
                gstreamer::FlowError::Error
            })?;
            let map = buffer.map_readable().map_err(|_| gstreamer::FlowError::Error)?;

            let frame = CameraFrame {
                width: video_info.width(),
                height: video_info.height(),
                data: Arc::from(map.as_slice()),
                stride: video_info.stride()[0] as u32,
                captured_at,
            };

            if frame_num % FRAME_LOG_INTERVAL == 0 {
                debug!(
                    frame = frame_num,
                    width = frame.width,
                    height = frame.height,
                    stride = frame.stride,
                    "Frame statistics"
                );
            }

            // Non-blocking: the poll loop only wants the latest frame anyway
            let mut sender = sender.clone();
            if let Err(e) = sender.try_send(frame) {
                if e.is_disconnected() {
                    return Err(gstreamer::FlowError::Eos);
                }
                debug!(frame = frame_num, "Frame dropped (channel full)");
            }

            Ok(gstreamer::FlowSuccess::Ok)
        })
        .build()
}

/// Close the frame channel when the running pipeline fails or ends
///
/// Messages are dropped after inspection; nothing pops the bus once the
/// stream is live.
fn watch_bus(pipeline: &gstreamer::Pipeline, sender: FrameSender) {
    let Some(bus) = pipeline.bus() else {
        warn!("Capture pipeline has no bus");
        return;
    };
    let sender = Mutex::new(sender);
    let close = move || {
        if let Ok(mut sender) = sender.lock() {
            sender.close_channel();
        }
    };

    bus.set_sync_handler(move |_, message| {
        match message.view() {
            gstreamer::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    "Camera stream failed"
                );
                close();
            }
            gstreamer::MessageView::Eos(_) => {
                warn!("Camera stream reached end of stream");
                close();
            }
            _ => {}
        }
        gstreamer::BusSyncReply::Drop
    });
}

/// Pull the first bus error and classify it
fn startup_error(pipeline: &gstreamer::Pipeline, fallback: String) -> CaptureError {
    let Some(bus) = pipeline.bus() else {
        return CaptureError::InitializationFailed(fallback);
    };
    while let Some(message) = bus.pop_filtered(&[gstreamer::MessageType::Error]) {
        if let gstreamer::MessageView::Error(err) = message.view() {
            let error = err.error();
            return classify_resource_error(
                error.kind::<gstreamer::ResourceError>(),
                error.to_string(),
            );
        }
    }
    CaptureError::InitializationFailed(fallback)
}

fn classify_resource_error(kind: Option<gstreamer::ResourceError>, message: String) -> CaptureError {
    match kind {
        Some(gstreamer::ResourceError::NotAuthorized) => CaptureError::PermissionDenied(message),
        Some(gstreamer::ResourceError::Busy) => CaptureError::Busy,
        Some(gstreamer::ResourceError::NotFound) => CaptureError::NoDevice,
        _ => CaptureError::InitializationFailed(message),
    }
}

/// A running capture pipeline
struct GstStream {
    label: String,
    pipeline: Option<gstreamer::Pipeline>,
    appsink: AppSink,
}

impl StreamControl for GstStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        info!(device = %self.label, "Stopping camera stream");

        // Dropping the callbacks and the bus handler drops every frame sender
        self.appsink.set_callbacks(AppSinkCallbacks::builder().build());
        if let Some(bus) = pipeline.bus() {
            bus.unset_sync_handler();
        }

        if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop capture pipeline");
            return;
        }
        let (result, state, _) =
            pipeline.state(gstreamer::ClockTime::from_seconds(STOP_TIMEOUT_SECS));
        match result {
            Ok(_) => debug!(state = ?state, "Capture pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Capture pipeline stop had issues"),
        }
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_errors_map_to_capture_errors() {
        assert_eq!(
            classify_resource_error(
                Some(gstreamer::ResourceError::NotAuthorized),
                "denied".into()
            ),
            CaptureError::PermissionDenied("denied".into())
        );
        assert_eq!(
            classify_resource_error(Some(gstreamer::ResourceError::Busy), "busy".into()),
            CaptureError::Busy
        );
        assert_eq!(
            classify_resource_error(Some(gstreamer::ResourceError::NotFound), "gone".into()),
            CaptureError::NoDevice
        );
        assert_eq!(
            classify_resource_error(None, "other".into()),
            CaptureError::InitializationFailed("other".into())
        );
    }
}
