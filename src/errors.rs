// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the kiosk
//!
//! Only [`CaptureError`] ever reaches the user (as a retry affordance).
//! Decode and remote errors are recovered locally and reported through
//! tracing. A decode miss and a too-short code are not errors at all.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Error a headless command exits with
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Camera error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    ManualEntry(#[from] ManualEntryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Camera acquisition errors (recoverable by a user retry)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No capture device present
    #[error("No camera devices found")]
    NoDevice,
    /// The device exists but access was refused
    #[error("Camera access denied: {0}")]
    PermissionDenied(String),
    /// Device is held by another process
    #[error("Camera is busy")]
    Busy,
    /// Pipeline could not be built or started
    #[error("Camera initialization failed: {0}")]
    InitializationFailed(String),
    /// A live stream stopped delivering frames
    #[error("Camera stream ended")]
    StreamEnded,
}

/// Decoder errors
///
/// `Unavailable` is only produced while probing the native detector and
/// makes the adapter start in sampling mode. `Runtime` from the native
/// detector demotes the adapter permanently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Native detector unavailable: {0}")]
    Unavailable(String),
    #[error("Detector failed: {0}")]
    Runtime(String),
    #[error("Image could not be read: {0}")]
    Image(String),
}

/// Remote logging errors (best-effort, never surfaced to the user)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The deadline fired before the write resolved; the write keeps running
    #[error("{operation} timeout after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// The backend answered but rejected the write
    #[error("Remote write rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The request never got an answer
    #[error("Remote request failed: {0}")]
    Transport(String),
    /// The backend answered with something unexpected
    #[error("Unexpected remote response: {0}")]
    Protocol(String),
    /// The write task died before resolving
    #[error("Remote write aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Required Firebase keys are absent
    #[error("Firebase configuration incomplete (missing: {})", .missing.join(", "))]
    Incomplete { missing: Vec<String> },
    /// Config file exists but could not be read or written
    #[error("Config file {}: {message}", .path.display())]
    File { path: PathBuf, message: String },
    /// Config content is not valid JSON for the expected shape
    #[error("Invalid configuration: {0}")]
    Parse(String),
    /// Config delivery endpoint could not be reached or answered with an error
    #[error("Config delivery failed: {0}")]
    Delivery(String),
    /// No platform config directory
    #[error("No configuration directory available")]
    NoConfigDir,
}

/// Manual entry rejected before normalization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManualEntryError {
    #[error("Mohon masukkan nomor resi")]
    MissingTrackingId,
}
