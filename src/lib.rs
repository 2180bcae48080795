// SPDX-License-Identifier: GPL-3.0-only

//! PaxiBox - a package intake kiosk
//!
//! Captures a tracking code from the camera, an uploaded image, or a manual
//! form, validates it, confirms it to the operator, and appends it to a
//! Firebase backend on a best-effort basis.
//!
//! # Architecture
//!
//! - [`capture`]: camera acquisition, poll loop, region of interest
//! - [`decoder`]: native detector with a sampling fallback
//! - [`intake`]: normalization and scan events
//! - [`session`]: the kiosk state machine
//! - [`remote`]: Firebase scan logging and config delivery
//! - [`config`]: user configuration handling
//! - [`terminal`]: the ratatui kiosk

pub mod capture;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod intake;
pub mod remote;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use intake::{InputNormalizer, ScanEvent, ScanSource};
pub use remote::RemoteLogger;
pub use session::{Session, SessionHandle};
