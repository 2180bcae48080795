// SPDX-License-Identifier: GPL-3.0-only

//! Scan events and confirmation content

use crate::constants::messages;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Where a code came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    /// Live camera detection
    Camera,
    /// Decoded from an uploaded image
    File,
    /// Typed into the manual entry form
    Manual,
}

impl ScanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanSource::Camera => "camera",
            ScanSource::File => "file",
            ScanSource::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdicted intake event
///
/// Built only by [`InputNormalizer`](super::InputNormalizer); fields are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    code: String,
    source: ScanSource,
    success: bool,
    #[serde(serialize_with = "serialize_millis")]
    timestamp: DateTime<Utc>,
    meta: Option<serde_json::Value>,
}

fn serialize_millis<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl ScanEvent {
    pub(crate) fn new(
        code: String,
        source: ScanSource,
        success: bool,
        timestamp: DateTime<Utc>,
        meta: Option<serde_json::Value>,
    ) -> Self {
        Self {
            code,
            source,
            success,
            timestamp,
            meta,
        }
    }

    /// Trimmed code (or manual composite)
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn source(&self) -> ScanSource {
        self.source
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp as RFC 3339 with millisecond precision
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn meta(&self) -> Option<&serde_json::Value> {
        self.meta.as_ref()
    }
}

/// Content of the confirmation popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub success: bool,
    pub title: &'static str,
    pub message: &'static str,
    /// Payload echoed back to the operator
    pub payload: String,
    pub source: ScanSource,
}

impl Confirmation {
    pub fn for_event(event: &ScanEvent) -> Self {
        let (title, message) = if event.success() {
            (messages::SUCCESS_TITLE, messages::SUCCESS_MESSAGE)
        } else {
            (messages::FAILURE_TITLE, messages::FAILURE_MESSAGE)
        };

        Self {
            success: event.success(),
            title,
            message,
            payload: event.code().to_string(),
            source: event.source(),
        }
    }
}
