// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application name used for config, cache and log directories
pub const APP_NAME: &str = "paxibox";

/// Kiosk policy defaults
///
/// These are the values used when the config file does not override them.
pub mod policy {
    use super::Duration;

    /// Minimum trimmed length (in characters) for a code to be accepted
    pub const MIN_CODE_LEN: usize = 3;

    /// Delay between dismissing a confirmation and restarting the camera.
    /// Keeps the last frame of the previous package from re-triggering.
    pub const SETTLE_DELAY: Duration = Duration::from_millis(250);

    /// Deadline for logging a scan event
    pub const LOG_TIMEOUT: Duration = Duration::from_millis(10_000);

    /// Deadline for the health-check write
    pub const HEALTH_TIMEOUT: Duration = Duration::from_millis(8_000);
}

/// Capture and detection constants
pub mod capture {
    /// Smallest region of interest (in native video pixels) handed to a decoder
    pub const ROI_MIN_SIZE: u32 = 16;

    /// Frames are downscaled to this maximum dimension before sampling
    pub const SAMPLING_MAX_DIMENSION: u32 = 640;

    /// Frame channel capacity between the capture device and the poll loop
    pub const FRAME_CHANNEL_CAPACITY: usize = 4;

    /// Appsink queue depth; old frames are dropped beyond this
    pub const MAX_BUFFERS: u32 = 2;

    /// Seconds to wait for the capture pipeline to reach PLAYING
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Seconds to wait for the capture pipeline to reach NULL
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Milliseconds the native detector may take per frame before it is
    /// considered broken
    pub const NATIVE_FRAME_TIMEOUT_MS: u64 = 1_000;

    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 300;

    /// Viewfinder overlay size as a fraction of the preview area
    pub const VIEWFINDER_FRACTION: f64 = 0.6;
}

/// Remote store layout
pub mod remote {
    /// Flat audit log of every scan
    pub const SCANS_PATH: &str = "scans";

    /// Root of per-package status updates (`{root}/{code}/updates`)
    pub const PACKAGES_ROOT: &str = "paxibox/packages";

    /// Liveness probe path on the Realtime Database
    pub const HEALTHCHECK_PATH: &str = "paxibox/system/healthcheck";

    /// Liveness probe collection on Firestore
    pub const HEALTHCHECK_COLLECTION: &str = "paxi_healthcheck";

    /// Identity Toolkit endpoint for anonymous sign-up
    pub const IDENTITY_SIGN_UP_URL: &str =
        "https://identitytoolkit.googleapis.com/v1/accounts:signUp";

    /// Firestore REST base URL
    pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

    /// Status written for successful scans
    pub const STATUS_SCANNED: &str = "scanned";

    /// Status written for failed scans
    pub const STATUS_FAILED: &str = "failed";

    /// Anonymous sign-in gives up after this and writes proceed unauthenticated
    pub const SIGN_IN_TIMEOUT_MS: u64 = 5_000;

    /// Upper bound for any single HTTP request to Firebase
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// User-facing messages (the kiosk is deployed in Indonesia)
pub mod messages {
    pub const SUCCESS_TITLE: &str = "input berhasil";
    pub const SUCCESS_MESSAGE: &str = "mohon masukkan paket pada box";
    pub const FAILURE_TITLE: &str = "input gagal";
    pub const FAILURE_MESSAGE: &str = "mohon coba lagi atau cek kembali penerima";
    pub const NO_CODE_IN_IMAGE: &str = "No QR code found in the image.";
    pub const UNSUPPORTED_IMAGE: &str = "Unsupported file. Choose a PNG, JPG, GIF, BMP or WEBP image.";
    pub const CAMERA_UNAVAILABLE: &str = "Could not access camera. Tap to retry, or use the image upload or manual input.";
}

/// Supported image upload formats
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Version string embedded by the build script
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}
