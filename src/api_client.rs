//! Shared reqwest plumbing for the remote model adapters.

use std::time::Duration;

use crate::error::{AttuneError, Result};

/// A base URL, optional bearer token and configured HTTP client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::Config`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AttuneError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST builder with the bearer token attached when one is configured.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(self.url(path));
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }
}

/// Send a request and reject non-2xx responses.
///
/// `wrap` chooses the error variant for the calling adapter.
pub(crate) async fn send_checked(
    request: reqwest::RequestBuilder,
    what: &str,
    wrap: fn(String) -> AttuneError,
) -> Result<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| wrap(format!("{what} request failed: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(wrap(format!(
            "{what} HTTP {}: {}",
            status.as_u16(),
            extract_error_message(&body)
        )));
    }
    Ok(response)
}

/// Pull a human-readable message out of an error response body.
///
/// Understands both `{"error": {"message": ..}}` and `{"error": ".."}`.
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
