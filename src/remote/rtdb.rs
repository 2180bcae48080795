// SPDX-License-Identifier: GPL-3.0-only

//! Realtime Database REST store

use super::RemoteResult;
use super::store::{RemoteStore, StoreKind, read_json};
use crate::errors::RemoteError;
use futures::future::BoxFuture;
use serde_json::Value;

/// Pushes children with `POST {databaseURL}/{path}.json`
#[derive(Debug, Clone)]
pub struct RealtimeDatabase {
    client: reqwest::Client,
    base_url: String,
}

impl RealtimeDatabase {
    pub fn new(client: reqwest::Client, database_url: &str) -> Self {
        Self {
            client,
            base_url: database_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }
}

impl RemoteStore for RealtimeDatabase {
    fn kind(&self) -> StoreKind {
        StoreKind::RealtimeDatabase
    }

    fn push(
        &self,
        path: &str,
        value: Value,
        auth: Option<String>,
    ) -> BoxFuture<'static, RemoteResult<String>> {
        let mut request = self.client.post(self.url(path)).json(&value);
        if let Some(token) = auth {
            request = request.query(&[("auth", token)]);
        }

        Box::pin(async move {
            let body = read_json(request.send().await?).await?;
            body.get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RemoteError::Protocol(format!("push returned no key: {}", body)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_path_and_suffix() {
        let db = RealtimeDatabase::new(reqwest::Client::new(), "https://paxi.firebaseio.com/");
        assert_eq!(
            db.url("paxibox/packages/PKG1/updates"),
            "https://paxi.firebaseio.com/paxibox/packages/PKG1/updates.json"
        );
        assert_eq!(db.url("/scans"), "https://paxi.firebaseio.com/scans.json");
    }
}
