// SPDX-License-Identifier: GPL-3.0-only

//! Firestore REST store
//!
//! Documents are created with `POST .../documents/{collection}`. The REST API
//! wants every value wrapped in a typed envelope (`stringValue`,
//! `mapValue`, ...); [`to_firestore_fields`] does the wrapping.

use super::RemoteResult;
use super::store::{RemoteStore, StoreKind, read_json};
use crate::constants::remote::FIRESTORE_BASE_URL;
use crate::errors::RemoteError;
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone)]
pub struct Firestore {
    client: reqwest::Client,
    documents_url: String,
    api_key: Option<String>,
}

impl Firestore {
    pub fn new(client: reqwest::Client, project_id: &str, api_key: Option<&str>) -> Self {
        Self::with_base_url(client, FIRESTORE_BASE_URL, project_id, api_key)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: &str,
        project_id: &str,
        api_key: Option<&str>,
    ) -> Self {
        Self {
            client,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            api_key: api_key.map(str::to_string),
        }
    }
}

impl RemoteStore for Firestore {
    fn kind(&self) -> StoreKind {
        StoreKind::Firestore
    }

    fn push(
        &self,
        path: &str,
        value: Value,
        auth: Option<String>,
    ) -> BoxFuture<'static, RemoteResult<String>> {
        let url = format!("{}/{}", self.documents_url, path.trim_matches('/'));
        let mut request = self
            .client
            .post(url)
            .json(&json!({ "fields": to_firestore_fields(&value) }));
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        if let Some(token) = auth {
            request = request.bearer_auth(token);
        }

        Box::pin(async move {
            let body = read_json(request.send().await?).await?;
            document_id(&body)
                .ok_or_else(|| RemoteError::Protocol(format!("create returned no name: {}", body)))
        })
    }
}

/// Last segment of the created document's resource name
fn document_id(body: &Value) -> Option<String> {
    body.get("name")?
        .as_str()?
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Convert a JSON object into a Firestore `fields` map
///
/// A non-object is stored under a single `value` field.
pub fn to_firestore_fields(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), to_firestore_value(value)))
            .collect(),
        other => {
            let mut fields = Map::new();
            fields.insert("value".to_string(), to_firestore_value(other));
            fields
        }
    }
}

fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore encodes 64-bit integers as strings
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({ "mapValue": { "fields": to_firestore_fields(value) } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_document_encoding() {
        let fields = to_firestore_fields(&json!({
            "code": "PKG123",
            "success": true,
            "meta": null,
            "attempt": 2,
            "ratio": 0.5,
            "tags": ["a"],
            "nested": { "resi": "R1" }
        }));

        assert_eq!(fields["code"], json!({"stringValue": "PKG123"}));
        assert_eq!(fields["success"], json!({"booleanValue": true}));
        assert_eq!(fields["meta"], json!({"nullValue": null}));
        assert_eq!(fields["attempt"], json!({"integerValue": "2"}));
        assert_eq!(fields["ratio"], json!({"doubleValue": 0.5}));
        assert_eq!(
            fields["tags"],
            json!({"arrayValue": {"values": [{"stringValue": "a"}]}})
        );
        assert_eq!(
            fields["nested"],
            json!({"mapValue": {"fields": {"resi": {"stringValue": "R1"}}}})
        );
    }

    #[test]
    fn test_document_id_is_last_name_segment() {
        let body = json!({"name": "projects/paxi/databases/(default)/documents/scans/abc123"});
        assert_eq!(document_id(&body).as_deref(), Some("abc123"));
        assert_eq!(document_id(&json!({})), None);
    }

    #[test]
    fn test_collection_url() {
        let store = Firestore::new(reqwest::Client::new(), "paxi", None);
        assert_eq!(
            store.documents_url,
            "https://firestore.googleapis.com/v1/projects/paxi/databases/(default)/documents"
        );
    }
}
