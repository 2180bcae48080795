// SPDX-License-Identifier: GPL-3.0-only

//! Kiosk session state machine
//!
//! ```text
//!            SelectTab(Manual)                 SelectTab(Scan)
//!  ┌──────────┐ ───────────────▶ ┌──────────────┐ ──────────────▶ scanning
//!  │ scanning │                  │ manual-entry │
//!  └──────────┘ ◀─────────────── └──────────────┘
//!       │ detection / upload            │ submit
//!       ▼                               ▼
//!  ┌─────────────────────────────────────────┐
//!  │ confirming (ProcessingFlag set)         │
//!  └─────────────────────────────────────────┘
//!       │ dismiss: back to the active tab; the scan tab restarts the
//!       ▼ camera after the settle delay
//! ```
//!
//! The session is one task consuming an event channel. The poll loop,
//! settle timers, and the UI only talk to it through [`SessionHandle`].

mod events;
mod machine;

pub use events::{DismissReason, SessionEvent, SessionHandle, Tab};
pub use machine::{Collaborators, Flow, Session, SessionSettings};

use crate::errors::CaptureError;
use crate::intake::Confirmation;
use crate::remote::ConnectionReport;

/// Which view is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionView {
    Scanning,
    ManualEntry,
    Confirming,
}

impl SessionView {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionView::Scanning => "scanning",
            SessionView::ManualEntry => "manual-entry",
            SessionView::Confirming => "confirming",
        }
    }
}

/// Set while a confirmation is pending; blocks further intake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingFlag(bool);

impl ProcessingFlag {
    /// Raise the flag; false if it was already raised
    pub fn try_set(&mut self) -> bool {
        !std::mem::replace(&mut self.0, true)
    }

    pub fn clear(&mut self) {
        self.0 = false;
    }

    pub fn is_set(&self) -> bool {
        self.0
    }
}

/// What the session asks of a user interface
pub trait KioskView: Send + Sync {
    fn show_view(&self, view: SessionView, tab: Tab);
    fn show_confirmation(&self, confirmation: &Confirmation);
    fn hide_confirmation(&self);
    fn camera_started(&self, device: &str);
    /// Camera could not be acquired; offer a retry
    fn show_camera_retry(&self, error: &CaptureError);
    /// Short transient message (validation hints, upload misses)
    fn notify(&self, message: &str);
    fn connection_report(&self, report: &ConnectionReport);
}
