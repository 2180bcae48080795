// SPDX-License-Identifier: GPL-3.0-only

//! Remote scan logging
//!
//! Every accepted scan is appended to a Firebase backend. Logging is best
//! effort: each call races a deadline, failures only reach tracing, and a
//! write that loses the race keeps running in the background.
//!
//! Backend preference is the Realtime Database when a `databaseURL` is
//! configured, Firestore when only a `projectId` is, and a no-op otherwise.

pub mod firebase;
pub mod firestore;
pub mod identity;
pub mod rtdb;
pub mod store;
pub mod timeout;

pub use firebase::{ConfigDelivery, DeliveryResponse, FirebaseConfig};
pub use identity::{AnonymousIdentity, IdentityProvider};
pub use store::{RemoteStore, StoreKind};
pub use timeout::with_timeout;

use crate::constants::remote::{
    PACKAGES_ROOT, REQUEST_TIMEOUT_SECS, SCANS_PATH, SIGN_IN_TIMEOUT_MS, STATUS_FAILED,
    STATUS_SCANNED,
};
use crate::errors::RemoteError;
use crate::intake::ScanEvent;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Keys generated by a successful `log_scan`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogReceipt {
    /// Key of the audit-log entry under `scans`
    pub scan_key: Option<String>,
    /// Key of the package status update, when one was written
    pub update_key: Option<String>,
}

impl LogReceipt {
    /// Whether anything was written (false when logging is disabled)
    pub fn is_recorded(&self) -> bool {
        self.scan_key.is_some()
    }
}

/// Outcome of a health-check write; never an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionReport {
    fn success(id: String) -> Self {
        Self {
            ok: true,
            id: Some(id),
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            error: Some(error.into()),
        }
    }
}

/// HTTP client for every Firebase request
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "HTTP client setup failed, using defaults");
            reqwest::Client::new()
        })
}

/// Strip everything but `[A-Za-z0-9_-]` so a code can be used as a path key
pub fn sanitize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

struct Backend {
    store: Arc<dyn RemoteStore>,
    identity: Option<Arc<dyn IdentityProvider>>,
    /// Settled identity outcome; `None` inside means "write unauthenticated"
    token: OnceCell<Option<String>>,
}

impl Backend {
    /// Sign in once; every later write reuses the outcome
    ///
    /// A sign-in that outlives `SIGN_IN_TIMEOUT_MS` settles as unauthenticated.
    async fn auth_token(&self) -> Option<String> {
        let Some(identity) = self.identity.as_ref() else {
            return None;
        };
        self.token
            .get_or_init(|| async {
                let limit = Duration::from_millis(SIGN_IN_TIMEOUT_MS);
                match tokio::time::timeout(limit, identity.sign_in()).await {
                    Ok(Ok(token)) => Some(token),
                    Ok(Err(e)) => {
                        warn!(error = %e, "Anonymous sign-in failed, writing unauthenticated");
                        None
                    }
                    Err(_) => {
                        warn!(
                            after_ms = SIGN_IN_TIMEOUT_MS,
                            "Anonymous sign-in timed out, writing unauthenticated"
                        );
                        None
                    }
                }
            })
            .await
            .clone()
    }

    async fn write_scan(&self, event: &ScanEvent) -> RemoteResult<LogReceipt> {
        let auth = self.auth_token().await;
        let scan_doc =
            serde_json::to_value(event).map_err(|e| RemoteError::Protocol(e.to_string()))?;
        let package = sanitize_code(event.code());

        if self.store.kind().tracks_packages() && !package.is_empty() {
            let update = json!({
                "status": if event.success() { STATUS_SCANNED } else { STATUS_FAILED },
                "source": event.source(),
                "timestamp": event.timestamp_rfc3339(),
                "meta": event.meta(),
            });
            let update_path = format!("{}/{}/updates", PACKAGES_ROOT, package);
            let (update_key, scan_key) = futures::future::try_join(
                self.store.push(&update_path, update, auth.clone()),
                self.store.push(SCANS_PATH, scan_doc, auth),
            )
            .await?;
            return Ok(LogReceipt {
                scan_key: Some(scan_key),
                update_key: Some(update_key),
            });
        }

        let scan_key = self.store.push(SCANS_PATH, scan_doc, auth).await?;
        Ok(LogReceipt {
            scan_key: Some(scan_key),
            update_key: None,
        })
    }

    async fn write_healthcheck(&self) -> RemoteResult<String> {
        let auth = self.auth_token().await;
        let doc = json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        self.store
            .push(self.store.kind().healthcheck_path(), doc, auth)
            .await
    }
}

/// Best-effort scan logger
#[derive(Clone)]
pub struct RemoteLogger {
    backend: Option<Arc<Backend>>,
}

impl std::fmt::Debug for RemoteLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLogger")
            .field("store", &self.store_kind())
            .finish()
    }
}

impl RemoteLogger {
    /// A logger that records nothing
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn new(store: Arc<dyn RemoteStore>, identity: Option<Arc<dyn IdentityProvider>>) -> Self {
        Self {
            backend: Some(Arc::new(Backend {
                store,
                identity,
                token: OnceCell::new(),
            })),
        }
    }

    /// Pick a backend from the Firebase configuration
    pub fn from_config(config: Option<&FirebaseConfig>) -> Self {
        let Some(config) = config else {
            info!("No Firebase configuration, remote logging disabled");
            return Self::disabled();
        };

        let client = http_client();
        let store: Arc<dyn RemoteStore> = if let Some(url) = config.database_url() {
            Arc::new(rtdb::RealtimeDatabase::new(client.clone(), url))
        } else if let Some(project) = config.project_id() {
            Arc::new(firestore::Firestore::new(
                client.clone(),
                project,
                config.api_key(),
            ))
        } else {
            warn!("Firebase configuration has neither databaseURL nor projectId, remote logging disabled");
            return Self::disabled();
        };

        let identity = config
            .api_key()
            .map(|key| Arc::new(AnonymousIdentity::new(client, key)) as Arc<dyn IdentityProvider>);

        info!(
            store = store.kind().as_str(),
            anonymous_auth = identity.is_some(),
            "Remote logging enabled"
        );
        Self::new(store, identity)
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn store_kind(&self) -> Option<StoreKind> {
        self.backend.as_ref().map(|b| b.store.kind())
    }

    /// Append a scan event, giving up (but not cancelling) after `timeout`
    pub async fn log_scan(&self, event: &ScanEvent, timeout: Duration) -> RemoteResult<LogReceipt> {
        let Some(backend) = self.backend.as_ref() else {
            debug!(code = %event.code(), "Remote logging disabled, scan not recorded");
            return Ok(LogReceipt::default());
        };

        let backend = Arc::clone(backend);
        let owned = event.clone();
        let result = with_timeout("log_scan", timeout, async move {
            backend.write_scan(&owned).await
        })
        .await;

        match &result {
            Ok(receipt) => info!(
                code = %event.code(),
                source = %event.source(),
                scan_key = ?receipt.scan_key,
                update_key = ?receipt.update_key,
                "Scan logged"
            ),
            Err(e) => warn!(code = %event.code(), error = %e, "Failed to log scan"),
        }
        result
    }

    /// Write a liveness probe and report the outcome
    pub async fn test_connection(&self, timeout: Duration) -> ConnectionReport {
        let Some(backend) = self.backend.as_ref() else {
            return ConnectionReport::failure("remote logging is not configured");
        };

        let backend = Arc::clone(backend);
        match with_timeout("test_connection", timeout, async move {
            backend.write_healthcheck().await
        })
        .await
        {
            Ok(id) => {
                info!(id = %id, "Connection test passed");
                ConnectionReport::success(id)
            }
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                ConnectionReport::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_code() {
        assert_eq!(sanitize_code("PKG-123_ab"), "PKG-123_ab");
        assert_eq!(sanitize_code("RESI1 | Budi"), "RESI1Budi");
        assert_eq!(sanitize_code("https://x.y/z?q=1"), "httpsxyzq1");
        assert_eq!(sanitize_code("#$%"), "");
        assert_eq!(sanitize_code("résumé"), "rsum");
    }

    #[tokio::test]
    async fn test_disabled_logger_is_a_no_op() {
        let logger = RemoteLogger::disabled();
        let event = crate::intake::InputNormalizer::default()
            .normalize("PKG123", crate::intake::ScanSource::Camera);
        let receipt = logger
            .log_scan(&event, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(!receipt.is_recorded());

        let report = logger.test_connection(Duration::from_millis(10)).await;
        assert!(!report.ok);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_backend_preference() {
        let mut config = FirebaseConfig {
            project_id: Some("paxi".into()),
            ..Default::default()
        };
        assert_eq!(
            RemoteLogger::from_config(Some(&config)).store_kind(),
            Some(StoreKind::Firestore)
        );

        config.database_url = Some("https://paxi.firebaseio.com".into());
        assert_eq!(
            RemoteLogger::from_config(Some(&config)).store_kind(),
            Some(StoreKind::RealtimeDatabase)
        );

        assert!(!RemoteLogger::from_config(Some(&FirebaseConfig::default())).is_enabled());
        assert!(!RemoteLogger::from_config(None).is_enabled());
    }
}
