// SPDX-License-Identifier: GPL-3.0-only

//! Anonymous sign-in through the Identity Toolkit REST API

use super::RemoteResult;
use super::store::read_json;
use crate::constants::remote::IDENTITY_SIGN_UP_URL;
use crate::errors::RemoteError;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Produces an ID token for remote writes
pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self) -> BoxFuture<'static, RemoteResult<String>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    #[serde(default)]
    local_id: Option<String>,
}

/// Anonymous account sign-up keyed by the project's web API key
#[derive(Debug, Clone)]
pub struct AnonymousIdentity {
    client: reqwest::Client,
    api_key: String,
}

impl AnonymousIdentity {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

impl IdentityProvider for AnonymousIdentity {
    fn sign_in(&self) -> BoxFuture<'static, RemoteResult<String>> {
        let request = self
            .client
            .post(IDENTITY_SIGN_UP_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "returnSecureToken": true }));

        Box::pin(async move {
            let body = read_json(request.send().await?).await?;
            let response: SignUpResponse = serde_json::from_value(body)
                .map_err(|e| RemoteError::Protocol(format!("sign-up response: {}", e)))?;
            debug!(uid = ?response.local_id, "Anonymous sign-in succeeded");
            Ok(response.id_token)
        })
    }
}
