// SPDX-License-Identifier: GPL-3.0-only

//! Firebase project configuration and its delivery endpoint

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Firebase web-app configuration
///
/// Field names follow the Firebase console's JSON export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(
        default,
        rename = "databaseURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub database_url: Option<String>,
}

/// (JSON key, environment suffix) for every required key, in delivery order
const KEYS: [(&str, &str); 7] = [
    ("apiKey", "API_KEY"),
    ("authDomain", "AUTH_DOMAIN"),
    ("projectId", "PROJECT_ID"),
    ("storageBucket", "STORAGE_BUCKET"),
    ("messagingSenderId", "MESSAGING_SENDER_ID"),
    ("appId", "APP_ID"),
    ("databaseURL", "DATABASE_URL"),
];

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl FirebaseConfig {
    /// Build from `NEXT_PUBLIC_FIREBASE_*`, falling back to `FIREBASE_*`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| -> Option<String> {
            lookup(&format!("NEXT_PUBLIC_FIREBASE_{}", suffix))
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(&format!("FIREBASE_{}", suffix)).filter(|v| !v.is_empty()))
        };
        Self {
            api_key: read("API_KEY"),
            auth_domain: read("AUTH_DOMAIN"),
            project_id: read("PROJECT_ID"),
            storage_bucket: read("STORAGE_BUCKET"),
            messaging_sender_id: read("MESSAGING_SENDER_ID"),
            app_id: read("APP_ID"),
            database_url: read("DATABASE_URL"),
        }
    }

    fn field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "apiKey" => &self.api_key,
            "authDomain" => &self.auth_domain,
            "projectId" => &self.project_id,
            "storageBucket" => &self.storage_bucket,
            "messagingSenderId" => &self.messaging_sender_id,
            "appId" => &self.app_id,
            "databaseURL" => &self.database_url,
            _ => return None,
        };
        present(value)
    }

    /// Required keys that are absent or blank
    pub fn missing_keys(&self) -> Vec<String> {
        KEYS.iter()
            .filter(|(key, _)| self.field(key).is_none())
            .map(|(key, _)| key.to_string())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }

    /// Whether remote logging can run at all (RTDB or Firestore reachable)
    pub fn is_usable(&self) -> bool {
        self.database_url().is_some() || self.project_id().is_some()
    }

    pub fn api_key(&self) -> Option<&str> {
        present(&self.api_key)
    }

    pub fn project_id(&self) -> Option<&str> {
        present(&self.project_id)
    }

    pub fn database_url(&self) -> Option<&str> {
        present(&self.database_url)
    }

    /// Fetch the configuration from a delivery endpoint
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self, ConfigError> {
        info!(url, "Fetching Firebase configuration");

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ConfigError::Delivery(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ConfigError::Delivery(format!("invalid JSON: {}", e)))?;

        if !status.is_success() {
            let missing: Vec<String> = body
                .get("missing")
                .and_then(Value::as_array)
                .map(|keys| {
                    keys.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if !missing.is_empty() {
                return Err(ConfigError::Incomplete { missing });
            }
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unexpected status");
            return Err(ConfigError::Delivery(format!("{}: {}", status, message)));
        }

        let config: Self =
            serde_json::from_value(body).map_err(|e| ConfigError::Parse(e.to_string()))?;
        debug!(missing = ?config.missing_keys(), "Firebase configuration fetched");
        Ok(config)
    }
}

/// A response from the configuration delivery endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Value,
}

/// Server side of configuration delivery
pub struct ConfigDelivery;

impl ConfigDelivery {
    const HEADERS: [(&'static str, &'static str); 3] = [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET"),
        ("Content-Type", "application/json"),
    ];

    /// Answer a request for the Firebase configuration
    pub fn respond(method: &str, config: &FirebaseConfig) -> DeliveryResponse {
        let headers = Self::HEADERS.to_vec();

        if !method.eq_ignore_ascii_case("GET") {
            return DeliveryResponse {
                status: 405,
                headers,
                body: json!({ "error": "Method not allowed" }),
            };
        }

        let missing = config.missing_keys();
        if !missing.is_empty() {
            return DeliveryResponse {
                status: 500,
                headers,
                body: json!({
                    "error": "Firebase configuration incomplete",
                    "missing": missing,
                }),
            };
        }

        let mut body = serde_json::Map::new();
        for (key, _) in KEYS {
            if let Some(value) = config.field(key) {
                body.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        DeliveryResponse {
            status: 200,
            headers,
            body: Value::Object(body),
        }
    }

    /// Answer from the process environment
    pub fn respond_from_env(method: &str) -> DeliveryResponse {
        Self::respond(method, &FirebaseConfig::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> FirebaseConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FirebaseConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn complete() -> FirebaseConfig {
        env(&[
            ("NEXT_PUBLIC_FIREBASE_API_KEY", "key"),
            ("NEXT_PUBLIC_FIREBASE_AUTH_DOMAIN", "paxi.firebaseapp.com"),
            ("NEXT_PUBLIC_FIREBASE_PROJECT_ID", "paxi"),
            ("FIREBASE_STORAGE_BUCKET", "paxi.appspot.com"),
            ("FIREBASE_MESSAGING_SENDER_ID", "123"),
            ("FIREBASE_APP_ID", "1:123:web:abc"),
            ("FIREBASE_DATABASE_URL", "https://paxi.firebaseio.com"),
        ])
    }

    #[test]
    fn test_public_prefix_wins_over_plain() {
        let config = env(&[
            ("NEXT_PUBLIC_FIREBASE_PROJECT_ID", "public"),
            ("FIREBASE_PROJECT_ID", "plain"),
            ("NEXT_PUBLIC_FIREBASE_API_KEY", ""),
            ("FIREBASE_API_KEY", "fallback"),
        ]);
        assert_eq!(config.project_id(), Some("public"));
        assert_eq!(config.api_key(), Some("fallback"));
    }

    #[test]
    fn test_complete_config_is_delivered() {
        let response = ConfigDelivery::respond("GET", &complete());
        assert_eq!(response.status, 200);
        assert_eq!(response.body["databaseURL"], "https://paxi.firebaseio.com");
        assert_eq!(response.body["storageBucket"], "paxi.appspot.com");
        assert!(
            response
                .headers
                .contains(&("Access-Control-Allow-Origin", "*"))
        );
    }

    #[test]
    fn test_missing_keys_are_reported() {
        let mut config = complete();
        config.database_url = None;
        config.app_id = Some("  ".into());

        let response = ConfigDelivery::respond("GET", &config);
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "Firebase configuration incomplete");
        assert_eq!(response.body["missing"], json!(["appId", "databaseURL"]));
    }

    #[test]
    fn test_only_get_is_allowed() {
        let response = ConfigDelivery::respond("POST", &complete());
        assert_eq!(response.status, 405);
        assert_eq!(response.body["error"], "Method not allowed");
    }

    #[test]
    fn test_database_url_uses_console_key_name() {
        let config: FirebaseConfig = serde_json::from_value(json!({
            "projectId": "paxi",
            "databaseURL": "https://paxi.firebaseio.com"
        }))
        .unwrap();
        assert_eq!(config.database_url(), Some("https://paxi.firebaseio.com"));
        assert!(config.is_usable());
        assert!(!config.is_complete());

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back, json!({"projectId": "paxi", "databaseURL": "https://paxi.firebaseio.com"}));
    }
}
