// SPDX-License-Identifier: GPL-3.0-only

//! Decoder adapter
//!
//! Two decoding strategies sit behind one `detect` call:
//!
//! - **Native**: a platform detector (GStreamer `zbar` when built with the
//!   `zbar` feature) probed once at construction. A probe failure leaves the
//!   adapter in sampling mode.
//! - **Sampling**: a pixel-buffer decoder (`rqrr`) run on the rasterized
//!   frame. Always available.
//!
//! A runtime failure of the native detector demotes the adapter to sampling
//! for the rest of its life. An empty result is a miss, not a failure.

pub mod native;
pub mod sampling;
#[cfg(feature = "zbar")]
pub mod zbar;

pub use native::{FrameSource, NativeDetector, NativeDetectorFactory, UnavailableFactory};
pub use sampling::{PixelDecoder, RqrrDecoder};

use crate::capture::types::CameraFrame;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Which strategy is answering `detect` calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    Native,
    Sampling,
}

impl DecoderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderKind::Native => "native",
            DecoderKind::Sampling => "sampling",
        }
    }
}

/// "Try native, else sample" decoding policy
pub struct DecoderAdapter {
    native: Option<Box<dyn NativeDetector>>,
    sampler: Arc<dyn PixelDecoder>,
}

impl DecoderAdapter {
    /// Probe the native detector and fall back to sampling if it is absent
    pub fn probe(factory: &dyn NativeDetectorFactory, sampler: Arc<dyn PixelDecoder>) -> Self {
        let native = match factory.create() {
            Ok(detector) => {
                info!(detector = detector.name(), "Native barcode detector available");
                Some(detector)
            }
            Err(e) => {
                info!(error = %e, "Native barcode detector unavailable, using frame sampling");
                None
            }
        };
        Self { native, sampler }
    }

    /// Adapter that never tries a native detector
    pub fn sampling_only(sampler: Arc<dyn PixelDecoder>) -> Self {
        Self {
            native: None,
            sampler,
        }
    }

    /// Platform default: zbar when compiled in, rqrr sampling otherwise
    pub fn platform_default(prefer_native: bool, max_dimension: u32) -> Self {
        let sampler: Arc<dyn PixelDecoder> = Arc::new(RqrrDecoder::with_max_dimension(max_dimension));
        if !prefer_native {
            return Self::sampling_only(sampler);
        }

        #[cfg(feature = "zbar")]
        {
            Self::probe(&zbar::ZbarFactory, sampler)
        }
        #[cfg(not(feature = "zbar"))]
        {
            Self::probe(&UnavailableFactory, sampler)
        }
    }

    pub fn kind(&self) -> DecoderKind {
        if self.native.is_some() {
            DecoderKind::Native
        } else {
            DecoderKind::Sampling
        }
    }

    /// Decode the current frame
    ///
    /// `frame` is the full video frame when no crop was applied; the native
    /// detector then reads it directly. Otherwise both strategies read the
    /// rasterized `raster`.
    pub async fn detect(&mut self, frame: Option<&CameraFrame>, raster: &RgbaImage) -> Vec<String> {
        if let Some(native) = self.native.as_ref() {
            let source = match frame {
                Some(frame) => FrameSource::Frame(frame),
                None => FrameSource::Raster(raster),
            };
            match native.detect(source).await {
                Ok(codes) => return codes,
                Err(e) => {
                    warn!(
                        detector = native.name(),
                        error = %e,
                        "Native detector failed, falling back to frame sampling"
                    );
                    self.native = None;
                }
            }
        }

        self.sample(raster).await
    }

    /// Run the sampling decoder off the async runtime
    async fn sample(&self, raster: &RgbaImage) -> Vec<String> {
        if raster.width() == 0 || raster.height() == 0 {
            return Vec::new();
        }
        let sampler = Arc::clone(&self.sampler);
        let image = raster.clone();
        tokio::task::spawn_blocking(move || sampler.decode(&image))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Sampling decode task panicked");
                Vec::new()
            })
    }
}

impl std::fmt::Debug for DecoderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderAdapter")
            .field("kind", &self.kind())
            .finish()
    }
}
