// SPDX-License-Identifier: GPL-3.0-only

use crate::capture::{FacingMode, StreamRequest};
use crate::constants::{APP_NAME, capture, policy};
use crate::errors::ConfigError;
use crate::remote::{FirebaseConfig, http_client};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Camera selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Device name or path; overrides the facing preference
    pub device: Option<String>,
    /// Preferred camera direction
    pub facing: FacingMode,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: None,
            facing: FacingMode::Environment,
        }
    }
}

impl CameraSettings {
    pub fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            facing: self.facing,
            device: self.device.clone(),
        }
    }
}

/// Barcode decoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Try the platform detector before frame sampling
    pub prefer_native: bool,
    /// Largest dimension the sampling decoder works at
    pub max_dimension: u32,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            prefer_native: true,
            max_dimension: capture::SAMPLING_MAX_DIMENSION,
        }
    }
}

/// Kiosk configuration, stored as JSON in the user config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shortest accepted code, in characters after trimming
    pub min_code_len: usize,
    /// Pause between dismissing a confirmation and restarting the camera
    pub settle_delay_ms: u64,
    /// Deadline for scan logging
    pub log_timeout_ms: u64,
    /// Deadline for the connection test
    pub health_timeout_ms: u64,
    pub camera: CameraSettings,
    pub decoder: DecoderSettings,
    /// Inline Firebase project configuration
    pub firebase: Option<FirebaseConfig>,
    /// Endpoint serving the Firebase configuration as JSON
    pub firebase_config_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_code_len: policy::MIN_CODE_LEN,
            settle_delay_ms: policy::SETTLE_DELAY.as_millis() as u64,
            log_timeout_ms: policy::LOG_TIMEOUT.as_millis() as u64,
            health_timeout_ms: policy::HEALTH_TIMEOUT.as_millis() as u64,
            camera: CameraSettings::default(),
            decoder: DecoderSettings::default(),
            firebase: None,
            firebase_config_url: None,
        }
    }
}

impl Config {
    /// `<config_dir>/paxibox/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME).join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!(error = %e, "Using default configuration");
                Self::default()
            }),
            Err(e) => {
                warn!(error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let file_error = |e: std::io::Error| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(file_error)?;
        }
        let text =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text).map_err(file_error)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn log_timeout(&self) -> Duration {
        Duration::from_millis(self.log_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    /// Firebase configuration: inline, then the delivery URL, then the environment
    pub async fn resolve_firebase(&self) -> Option<FirebaseConfig> {
        if let Some(inline) = self.firebase.as_ref().filter(|c| c.is_usable()) {
            debug!("Using inline Firebase configuration");
            return Some(inline.clone());
        }

        if let Some(url) = self.firebase_config_url.as_deref() {
            match FirebaseConfig::fetch(&http_client(), url).await {
                Ok(fetched) if fetched.is_usable() => return Some(fetched),
                Ok(_) => warn!(url, "Delivered Firebase configuration is unusable"),
                Err(e) => warn!(url, error = %e, "Firebase configuration delivery failed"),
            }
        }

        let from_env = FirebaseConfig::from_env();
        if from_env.is_usable() {
            debug!("Using Firebase configuration from environment");
            return Some(from_env);
        }
        None
    }
}
