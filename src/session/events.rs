// SPDX-License-Identifier: GPL-3.0-only

//! Session inputs and the handle that delivers them

use crate::capture::DetectionSink;
use crate::errors::CaptureError;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Which of the two input tabs is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Scan,
    Manual,
}

/// How the operator closed the confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    CloseButton,
    Backdrop,
    CancelKey,
}

/// Everything the session reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SelectTab(Tab),
    /// Operator asked to retry a failed camera
    RetryCamera,
    /// The poll loop decoded a code
    Detected { code: String },
    /// The live camera stream closed on its own
    CaptureLost(CaptureError),
    SubmitManual { tracking_id: String, recipient: String },
    UploadImage(PathBuf),
    DismissConfirmation(DismissReason),
    /// A settle delay finished; stale when the generation moved on
    SettleElapsed(u64),
    CheckConnection,
    Shutdown,
}

/// Cloneable sender for session events
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub(crate) fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Queue an event; false once the session is gone
    pub fn send(&self, event: SessionEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!(event = ?e.0, "Session closed, event dropped");
                false
            }
        }
    }

    pub fn select_tab(&self, tab: Tab) -> bool {
        self.send(SessionEvent::SelectTab(tab))
    }

    pub fn submit_manual(&self, tracking_id: impl Into<String>, recipient: impl Into<String>) -> bool {
        self.send(SessionEvent::SubmitManual {
            tracking_id: tracking_id.into(),
            recipient: recipient.into(),
        })
    }

    pub fn upload_image(&self, path: impl Into<PathBuf>) -> bool {
        self.send(SessionEvent::UploadImage(path.into()))
    }

    pub fn dismiss(&self, reason: DismissReason) -> bool {
        self.send(SessionEvent::DismissConfirmation(reason))
    }

    pub fn retry_camera(&self) -> bool {
        self.send(SessionEvent::RetryCamera)
    }

    pub fn check_connection(&self) -> bool {
        self.send(SessionEvent::CheckConnection)
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }
}

impl DetectionSink for SessionHandle {
    fn detected(&self, code: String) {
        self.send(SessionEvent::Detected { code });
    }

    fn stream_lost(&self, error: CaptureError) {
        self.send(SessionEvent::CaptureLost(error));
    }
}
