// SPDX-License-Identifier: GPL-3.0-only

//! Remote document store seam

use super::RemoteResult;
use crate::constants::remote::{HEALTHCHECK_COLLECTION, HEALTHCHECK_PATH};
use crate::errors::RemoteError;
use futures::future::BoxFuture;
use serde_json::Value;

/// Which Firebase product a store writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Realtime Database: append-only pushes with server-generated keys
    RealtimeDatabase,
    /// Firestore: documents added to collections
    Firestore,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::RealtimeDatabase => "rtdb",
            StoreKind::Firestore => "firestore",
        }
    }

    /// Where liveness probes are written
    pub fn healthcheck_path(&self) -> &'static str {
        match self {
            StoreKind::RealtimeDatabase => HEALTHCHECK_PATH,
            StoreKind::Firestore => HEALTHCHECK_COLLECTION,
        }
    }

    /// Whether per-package status updates are written alongside the scan log
    pub fn tracks_packages(&self) -> bool {
        matches!(self, StoreKind::RealtimeDatabase)
    }
}

/// An append-only remote store
pub trait RemoteStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// Append `value` under `path`, returning the generated key
    ///
    /// `auth` is an ID token from the identity step, if one was obtained.
    fn push(
        &self,
        path: &str,
        value: Value,
        auth: Option<String>,
    ) -> BoxFuture<'static, RemoteResult<String>>;
}

/// Read a JSON body, turning non-2xx answers into [`RemoteError::Rejected`]
pub(crate) async fn read_json(response: reqwest::Response) -> RemoteResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    response
        .json()
        .await
        .map_err(|e| RemoteError::Protocol(e.to_string()))
}

/// Pull the human-readable part out of a Firebase error body
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let error = &value["error"];
    error["message"]
        .as_str()
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}
