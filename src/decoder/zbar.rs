// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer `zbar` element as the native barcode detector
//!
//! Frames are pushed through `appsrc ! videoconvert ! zbar ! appsink`. The
//! zbar element posts a `barcode` element message per symbol it finds; those
//! are collected from the bus once the frame has reached the sink.

use super::native::{FrameSource, NativeDetector, NativeDetectorFactory};
use crate::constants::capture::NATIVE_FRAME_TIMEOUT_MS;
use crate::errors::DecodeError;
use futures::future::BoxFuture;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSrc};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Probes for the zbar element
#[derive(Debug, Clone, Copy, Default)]
pub struct ZbarFactory;

impl NativeDetectorFactory for ZbarFactory {
    fn create(&self) -> Result<Box<dyn NativeDetector>, DecodeError> {
        gstreamer::init().map_err(|e| DecodeError::Unavailable(e.to_string()))?;
        if gstreamer::ElementFactory::find("zbar").is_none() {
            return Err(DecodeError::Unavailable(
                "GStreamer zbar element not installed".to_string(),
            ));
        }
        Ok(Box::new(ZbarDetector::default()))
    }
}

/// Native detector backed by a lazily built zbar pipeline
#[derive(Default)]
pub struct ZbarDetector {
    pipeline: Arc<Mutex<Option<ZbarPipeline>>>,
}

impl NativeDetector for ZbarDetector {
    fn name(&self) -> &str {
        "zbar"
    }

    fn detect<'a>(
        &'a self,
        source: FrameSource<'a>,
    ) -> BoxFuture<'a, Result<Vec<String>, DecodeError>> {
        let (width, height) = source.dimensions();
        let data = source.to_packed_rgba();
        let slot = Arc::clone(&self.pipeline);

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut slot = slot
                    .lock()
                    .map_err(|_| DecodeError::Runtime("zbar pipeline lock poisoned".into()))?;

                // Caps are fixed per pipeline; rebuild when the frame size changes
                let pipeline = match slot.take() {
                    Some(existing) if existing.size == (width, height) => existing,
                    _ => ZbarPipeline::new(width, height)?,
                };
                let result = pipeline.scan(data);
                *slot = Some(pipeline);
                result
            })
            .await
            .map_err(|e| DecodeError::Runtime(format!("zbar task failed: {}", e)))?
        })
    }
}

struct ZbarPipeline {
    pipeline: gstreamer::Pipeline,
    appsrc: AppSrc,
    appsink: AppSink,
    bus: gstreamer::Bus,
    size: (u32, u32),
}

impl ZbarPipeline {
    fn new(width: u32, height: u32) -> Result<Self, DecodeError> {
        let runtime = |message: String| DecodeError::Runtime(message);

        let pipeline = gstreamer::parse::launch(
            "appsrc name=src is-live=false do-timestamp=true ! \
             videoconvert ! zbar ! \
             appsink name=sink max-buffers=1 drop=false sync=false",
        )
        .map_err(|e| runtime(format!("Failed to create zbar pipeline: {}", e)))?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| runtime("Failed to downcast to Pipeline".into()))?;

        let appsrc = pipeline
            .by_name("src")
            .ok_or_else(|| runtime("Failed to find appsrc".into()))?
            .downcast::<AppSrc>()
            .map_err(|_| runtime("Failed to downcast to AppSrc".into()))?;
        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| runtime("Failed to find appsink".into()))?
            .downcast::<AppSink>()
            .map_err(|_| runtime("Failed to downcast to AppSink".into()))?;

        let caps = gstreamer_video::VideoCapsBuilder::new()
            .format(gstreamer_video::VideoFormat::Rgba)
            .width(width as i32)
            .height(height as i32)
            .framerate(gstreamer::Fraction::new(0, 1))
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gstreamer::Format::Time);

        let bus = pipeline
            .bus()
            .ok_or_else(|| runtime("zbar pipeline has no bus".into()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| runtime(format!("Failed to start zbar pipeline: {}", e)))?;

        info!(width, height, "zbar pipeline ready");
        Ok(Self {
            pipeline,
            appsrc,
            appsink,
            bus,
            size: (width, height),
        })
    }

    fn scan(&self, data: Vec<u8>) -> Result<Vec<String>, DecodeError> {
        self.appsrc
            .push_buffer(gstreamer::Buffer::from_mut_slice(data))
            .map_err(|e| DecodeError::Runtime(format!("zbar rejected frame: {:?}", e)))?;

        let delivered = self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(NATIVE_FRAME_TIMEOUT_MS))
            .is_some();

        let mut codes = Vec::new();
        while let Some(message) = self.bus.pop_filtered(&[
            gstreamer::MessageType::Element,
            gstreamer::MessageType::Error,
        ]) {
            match message.view() {
                gstreamer::MessageView::Error(err) => {
                    return Err(DecodeError::Runtime(err.error().to_string()));
                }
                gstreamer::MessageView::Element(_) => {
                    if let Some(structure) = message.structure()
                        && structure.has_name("barcode")
                        && let Ok(symbol) = structure.get::<String>("symbol")
                    {
                        debug!(symbol = %symbol, "zbar detected symbol");
                        codes.push(symbol);
                    }
                }
                _ => {}
            }
        }

        if !delivered {
            return Err(DecodeError::Runtime(format!(
                "zbar produced no output within {}ms",
                NATIVE_FRAME_TIMEOUT_MS
            )));
        }
        Ok(codes)
    }
}

impl Drop for ZbarPipeline {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!("zbar pipeline stopped");
    }
}
