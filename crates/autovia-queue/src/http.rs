// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin JSON-over-HTTP client for the marketplace backend.
//!
//! Maps HTTP outcomes onto [`AutoviaError`] so that actions wrapped by the
//! request queue carry the status codes its retry policy inspects: non-2xx
//! responses become `Api { status, .. }`, connect failures and timeouts
//! become transient errors.

use std::time::Duration;

use autovia_config::model::ApiConfig;
use autovia_core::AutoviaError;
use serde_json::Value;
use tracing::debug;

/// Maximum response body bytes echoed into an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// JSON HTTP client bound to the marketplace backend base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for the configured backend with a per-request timeout.
    pub fn new(config: &ApiConfig, timeout: Duration) -> Result<Self, AutoviaError> {
        Self::from_parts(&config.base_url, timeout)
    }

    /// Creates a client for an explicit base URL (used by tests).
    pub fn from_parts(base_url: &str, timeout: Duration) -> Result<Self, AutoviaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutoviaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON document.
    pub async fn get_json(&self, path: &str) -> Result<Value, AutoviaError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await.map_err(map_send_error)?;
        read_json(response).await
    }

    /// POST a JSON body and read the JSON response.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, AutoviaError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;
        read_json(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Map a reqwest send error onto the queue's retry taxonomy.
fn map_send_error(err: reqwest::Error) -> AutoviaError {
    if err.is_timeout() {
        AutoviaError::Timeout {
            duration: Duration::ZERO,
        }
    } else {
        AutoviaError::Transport {
            message: format!("request failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

/// Read a response body, surfacing non-2xx statuses as `Api` errors.
async fn read_json(response: reqwest::Response) -> Result<Value, AutoviaError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| AutoviaError::Transport {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;

    if !status.is_success() {
        let mut message = body;
        if message.len() > ERROR_BODY_LIMIT {
            let mut end = ERROR_BODY_LIMIT;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        return Err(AutoviaError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| AutoviaError::Internal(format!("invalid JSON response: {e}")))
}
