// SPDX-License-Identifier: GPL-3.0-only

//! Validation of decoded and typed input

use super::event::{ScanEvent, ScanSource};
use crate::constants::policy;
use crate::errors::ManualEntryError;
use chrono::Utc;
use tracing::debug;

/// Separator between tracking identifier and recipient in manual entries
pub const MANUAL_SEPARATOR: &str = " | ";

/// Turns raw text into verdicted [`ScanEvent`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputNormalizer {
    min_len: usize,
}

impl Default for InputNormalizer {
    fn default() -> Self {
        Self::new(policy::MIN_CODE_LEN)
    }
}

impl InputNormalizer {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Trim and verdict a raw payload
    ///
    /// Length is counted in characters so that multi-byte recipient names
    /// are not over-counted.
    pub fn normalize(&self, raw: &str, source: ScanSource) -> ScanEvent {
        self.normalize_with_meta(raw, source, None)
    }

    pub fn normalize_with_meta(
        &self,
        raw: &str,
        source: ScanSource,
        meta: Option<serde_json::Value>,
    ) -> ScanEvent {
        let trimmed = raw.trim();
        let success = trimmed.chars().count() >= self.min_len;
        debug!(code = %trimmed, %source, success, "Normalized input");
        ScanEvent::new(trimmed.to_string(), source, success, Utc::now(), meta)
    }

    /// Normalize a manual form submission
    ///
    /// The composite code is `"{tracking_id} | {recipient}"`; meta carries the
    /// two fields separately.
    pub fn normalize_manual(
        &self,
        tracking_id: &str,
        recipient: &str,
    ) -> Result<ScanEvent, ManualEntryError> {
        let composite = compose_manual(tracking_id, recipient)?;
        let meta = serde_json::json!({
            "resi": tracking_id.trim(),
            "recipient": recipient.trim(),
        });
        Ok(self.normalize_with_meta(&composite, ScanSource::Manual, Some(meta)))
    }
}

/// Combine the manual form fields into one payload
pub fn compose_manual(tracking_id: &str, recipient: &str) -> Result<String, ManualEntryError> {
    let tracking_id = tracking_id.trim();
    if tracking_id.is_empty() {
        return Err(ManualEntryError::MissingTrackingId);
    }
    Ok(format!(
        "{}{}{}",
        tracking_id,
        MANUAL_SEPARATOR,
        recipient.trim()
    ))
}

/// Split a manual composite back into tracking identifier and recipient
///
/// Splits on the first separator; tracking identifiers never contain it
/// because they are trimmed single tokens.
pub fn split_manual(code: &str) -> Option<(&str, &str)> {
    if let Some((tracking_id, recipient)) = code.split_once(MANUAL_SEPARATOR) {
        return Some((tracking_id, recipient));
    }
    // An empty recipient loses its trailing space to the final trim
    code.strip_suffix(MANUAL_SEPARATOR.trim_end())
        .map(|tracking_id| (tracking_id, ""))
}
