// SPDX-License-Identifier: GPL-3.0-only

use super::events::{SessionEvent, SessionHandle, Tab};
use super::{KioskView, ProcessingFlag, SessionView};
use crate::capture::{
    CameraSource, CapturePipeline, FrameScanner, GstCameraSource, LayoutProbe, SharedScanner,
    StreamRequest,
};
use crate::config::Config;
use crate::constants::{file_formats, messages};
use crate::decoder::DecoderAdapter;
use crate::errors::{CaptureError, DecodeError};
use crate::intake::{Confirmation, InputNormalizer, ScanEvent, ScanSource};
use crate::remote::RemoteLogger;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Policy values the session runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub min_code_len: usize,
    pub settle_delay: Duration,
    pub log_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            min_code_len: config.min_code_len,
            settle_delay: config.settle_delay(),
            log_timeout: config.log_timeout(),
            health_timeout: config.health_timeout(),
        }
    }
}

/// Injected dependencies
pub struct Collaborators {
    pub camera: Arc<dyn CameraSource>,
    pub request: StreamRequest,
    pub scanner: SharedScanner,
    pub layout: Arc<dyn LayoutProbe>,
    pub logger: RemoteLogger,
    pub view: Arc<dyn KioskView>,
}

impl Collaborators {
    /// The GStreamer camera and platform decoder described by `config`
    pub fn from_config(
        config: &Config,
        layout: Arc<dyn LayoutProbe>,
        logger: RemoteLogger,
        view: Arc<dyn KioskView>,
    ) -> Self {
        let decoder = DecoderAdapter::platform_default(
            config.decoder.prefer_native,
            config.decoder.max_dimension,
        );
        Self {
            camera: Arc::new(GstCameraSource::new()),
            request: config.camera.stream_request(),
            scanner: FrameScanner::new(decoder).shared(),
            layout,
            logger,
            view,
        }
    }
}

/// Whether the event loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// One kiosk session
///
/// Owns the capture pipeline, the current view and tab, and the processing
/// flag. Every state change happens in [`Session::handle_event`].
pub struct Session {
    settings: SessionSettings,
    normalizer: InputNormalizer,
    capture: CapturePipeline,
    logger: RemoteLogger,
    view: Arc<dyn KioskView>,
    handle: SessionHandle,
    events: UnboundedReceiver<SessionEvent>,
    state: SessionView,
    tab: Tab,
    processing: ProcessingFlag,
    /// Bumped whenever a pending settle restart must be forgotten
    settle_generation: u64,
    session_id: Uuid,
    pending_logs: Vec<JoinHandle<()>>,
    disposed: bool,
}

impl Session {
    pub fn create(settings: SessionSettings, parts: Collaborators) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx);

        let capture = CapturePipeline::new(
            parts.camera,
            parts.request,
            parts.scanner,
            parts.layout,
            Arc::new(handle.clone()),
        );

        let session_id = Uuid::new_v4();
        info!(session = %session_id, "Session created");

        Self {
            settings,
            normalizer: InputNormalizer::new(settings.min_code_len),
            capture,
            logger: parts.logger,
            view: parts.view,
            handle,
            events,
            state: SessionView::Scanning,
            tab: Tab::Scan,
            processing: ProcessingFlag::default(),
            settle_generation: 0,
            session_id,
            pending_logs: Vec::new(),
            disposed: false,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn view(&self) -> SessionView {
        self.state
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_set()
    }

    pub fn capture_active(&self) -> bool {
        self.capture.is_active()
    }

    pub fn capture(&self) -> &CapturePipeline {
        &self.capture
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Enter the initial scanning view
    pub async fn begin(&mut self) {
        self.state = SessionView::Scanning;
        self.tab = Tab::Scan;
        self.view.show_view(self.state, self.tab);
        self.start_capture().await;
    }

    /// Drive the session until shutdown, then release the camera
    pub async fn run(mut self) {
        self.begin().await;
        while let Some(Flow::Continue) = self.step().await {}
        self.flush_logs().await;
        self.dispose();
    }

    /// Handle the next queued event; `None` when every handle is gone
    pub async fn step(&mut self) -> Option<Flow> {
        let event = self.events.recv().await?;
        Some(self.handle_event(event).await)
    }

    pub async fn handle_event(&mut self, event: SessionEvent) -> Flow {
        debug!(event = ?event, view = self.state.as_str(), "Session event");
        match event {
            SessionEvent::SelectTab(tab) => self.select_tab(tab).await,
            SessionEvent::RetryCamera => {
                if self.state == SessionView::Scanning && !self.capture.is_active() {
                    self.start_capture().await;
                }
            }
            SessionEvent::Detected { code } => self.on_detected(code).await,
            SessionEvent::CaptureLost(error) => self.on_capture_lost(error),
            SessionEvent::SubmitManual {
                tracking_id,
                recipient,
            } => self.on_manual(&tracking_id, &recipient),
            SessionEvent::UploadImage(path) => self.on_upload(&path).await,
            SessionEvent::DismissConfirmation(reason) => {
                debug!(reason = ?reason, "Dismissing confirmation");
                self.dismiss();
            }
            SessionEvent::SettleElapsed(generation) => self.on_settled(generation).await,
            SessionEvent::CheckConnection => self.check_connection(),
            SessionEvent::Shutdown => return Flow::Exit,
        }
        Flow::Continue
    }

    /// Stop the camera; safe to call more than once
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.settle_generation += 1;
        self.capture.stop();
        info!(session = %self.session_id, "Session disposed");
    }

    /// Wait for scan logs still racing their deadline
    pub async fn flush_logs(&mut self) {
        for task in self.pending_logs.drain(..) {
            let _ = task.await;
        }
    }

    async fn select_tab(&mut self, tab: Tab) {
        if self.state == SessionView::Confirming {
            debug!(tab = ?tab, "Tab change ignored while confirming");
            return;
        }
        let target = match tab {
            Tab::Scan => SessionView::Scanning,
            Tab::Manual => SessionView::ManualEntry,
        };
        if self.tab == tab && self.state == target {
            return;
        }

        self.tab = tab;
        self.settle_generation += 1;
        self.state = target;
        self.view.show_view(self.state, self.tab);

        match target {
            SessionView::Scanning => self.start_capture().await,
            _ => self.capture.stop(),
        }
    }

    async fn start_capture(&mut self) {
        if self.disposed {
            return;
        }
        match self.capture.start().await {
            Ok(()) => {
                if let Some(device) = self.capture.device_label() {
                    self.view.camera_started(device);
                }
            }
            Err(e) => self.view.show_camera_retry(&e),
        }
    }

    fn on_capture_lost(&mut self, error: CaptureError) {
        // A newer stream may already be polling
        if !self.capture.is_active() || self.capture.is_polling() {
            debug!(error = %error, "Stale capture loss ignored");
            return;
        }
        warn!(
            error = %error,
            device = self.capture.device_label().unwrap_or_default(),
            "Camera stream lost"
        );
        self.capture.stop();
        if self.state == SessionView::Scanning {
            self.view.show_camera_retry(&error);
        }
    }

    async fn on_detected(&mut self, code: String) {
        if self.processing.is_set() {
            debug!(code = %code, "Detection discarded while processing");
            return;
        }
        if self.state != SessionView::Scanning {
            debug!(code = %code, view = self.state.as_str(), "Stale detection discarded");
            return;
        }
        let decoder = self.capture.scanner().lock().await.decoder_kind();
        let meta = json!({
            "decoder": decoder.as_str(),
            "session": self.session_id.to_string(),
        });
        self.accept(ScanSource::Camera, |normalizer| {
            Some(normalizer.normalize_with_meta(&code, ScanSource::Camera, Some(meta)))
        });
    }

    fn on_manual(&mut self, tracking_id: &str, recipient: &str) {
        if self.processing.is_set() {
            debug!("Manual submission discarded while processing");
            return;
        }
        let view = Arc::clone(&self.view);
        self.accept(ScanSource::Manual, |normalizer| {
            match normalizer.normalize_manual(tracking_id, recipient) {
                Ok(event) => Some(event),
                Err(e) => {
                    view.notify(&e.to_string());
                    None
                }
            }
        });
    }

    async fn on_upload(&mut self, path: &Path) {
        if self.processing.is_set() {
            debug!(path = %path.display(), "Upload discarded while processing");
            return;
        }
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(file_formats::is_image_extension);
        if !supported {
            info!(path = %path.display(), "Upload rejected, not an image");
            self.view.notify(messages::UNSUPPORTED_IMAGE);
            return;
        }

        let image = match load_image(path).await {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Uploaded image unreadable");
                self.view.notify(&e.to_string());
                return;
            }
        };

        let (codes, decoder) = {
            let mut scanner = self.capture.scanner().lock().await;
            let codes = scanner.scan_image(&image).await;
            (codes, scanner.decoder_kind())
        };
        let Some(code) = codes.into_iter().next() else {
            info!(path = %path.display(), "No code in uploaded image");
            self.view.notify(messages::NO_CODE_IN_IMAGE);
            return;
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = json!({
            "file": file_name,
            "decoder": decoder.as_str(),
            "session": self.session_id.to_string(),
        });
        self.accept(ScanSource::File, |normalizer| {
            Some(normalizer.normalize_with_meta(&code, ScanSource::File, Some(meta)))
        });
    }

    /// Raise the flag, build the event, stop the camera, confirm, log
    fn accept<F>(&mut self, source: ScanSource, build: F)
    where
        F: FnOnce(&InputNormalizer) -> Option<ScanEvent>,
    {
        if !self.processing.try_set() {
            debug!(%source, "Intake discarded while processing");
            return;
        }
        let Some(event) = build(&self.normalizer) else {
            self.processing.clear();
            return;
        };

        self.settle_generation += 1;
        self.capture.stop();
        self.state = SessionView::Confirming;
        self.view.show_confirmation(&Confirmation::for_event(&event));

        info!(
            code = %event.code(),
            source = %event.source(),
            success = event.success(),
            "Intake accepted"
        );

        let logger = self.logger.clone();
        let timeout = self.settings.log_timeout;
        self.pending_logs.retain(|task| !task.is_finished());
        self.pending_logs.push(tokio::spawn(async move {
            // Outcome is already traced by the logger
            let _ = logger.log_scan(&event, timeout).await;
        }));
    }

    fn dismiss(&mut self) {
        if self.state != SessionView::Confirming {
            return;
        }
        self.processing.clear();
        self.view.hide_confirmation();

        match self.tab {
            Tab::Scan => {
                self.state = SessionView::Scanning;
                self.view.show_view(self.state, self.tab);
                self.settle_generation += 1;
                let generation = self.settle_generation;
                let delay = self.settings.settle_delay;
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    handle.send(SessionEvent::SettleElapsed(generation));
                });
            }
            Tab::Manual => {
                self.state = SessionView::ManualEntry;
                self.view.show_view(self.state, self.tab);
            }
        }
    }

    async fn on_settled(&mut self, generation: u64) {
        if generation != self.settle_generation {
            debug!(generation, current = self.settle_generation, "Stale settle timer");
            return;
        }
        if self.state == SessionView::Scanning && !self.processing.is_set() {
            self.start_capture().await;
        }
    }

    fn check_connection(&self) {
        let logger = self.logger.clone();
        let view = Arc::clone(&self.view);
        let timeout = self.settings.health_timeout;
        tokio::spawn(async move {
            let report = logger.test_connection(timeout).await;
            view.connection_report(&report);
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn load_image(path: &Path) -> Result<image::DynamicImage, DecodeError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::open(&owned))
        .await
        .map_err(|e| DecodeError::Image(e.to_string()))?
        .map_err(|e| DecodeError::Image(e.to_string()))
}
