//! HTTP poll client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{PollClient, PollError, PollResult};
use crate::{Error, Result};

/// HTTP poll client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollClientConfig {
    /// Base URL of the service, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Path of the poll endpoint, joined onto `base_url`.
    #[serde(default = "default_poll_path")]
    pub poll_path: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Raw `Cookie` header value for session-authenticated endpoints.
    #[serde(default)]
    pub session_cookie: Option<String>,
}

fn default_poll_path() -> String {
    "/api/v1/interests/poll".to_string()
}

fn default_timeout() -> u64 {
    8
}

impl Default for PollClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            poll_path: default_poll_path(),
            timeout_secs: default_timeout(),
            session_cookie: None,
        }
    }
}

impl PollClientConfig {
    /// Request timeout. A hung poll would stall the schedule, so zero is
    /// rejected.
    pub fn timeout(&self) -> Result<Duration> {
        if self.timeout_secs == 0 {
            return Err(Error::config("request timeout must be at least one second"));
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }

    /// Resolve the full endpoint URL.
    pub fn endpoint(&self) -> Result<Url> {
        if self.base_url.trim().is_empty() {
            return Err(Error::config("poll base URL is empty"));
        }
        Ok(Url::parse(&self.base_url)?.join(&self.poll_path)?)
    }
}

/// Poll client for the `GET <poll-path>?last_id=<id>` endpoint.
pub struct HttpPollClient {
    endpoint: Url,
    client: Client,
}

impl HttpPollClient {
    /// Create a new client. Fails on an invalid URL or cookie value.
    pub fn new(config: &PollClientConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(cookie) = &config.session_cookie {
            let value = header::HeaderValue::from_str(cookie)
                .map_err(|e| Error::config(format!("invalid session cookie: {}", e)))?;
            headers.insert(header::COOKIE, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout()?)
            .build()?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn transport_error(error: reqwest::Error) -> PollError {
    if error.is_timeout() {
        PollError::Transport(format!("request timed out: {}", error))
    } else {
        PollError::Transport(error.to_string())
    }
}

#[async_trait]
impl PollClient for HttpPollClient {
    async fn poll(&self, watermark: u64) -> std::result::Result<PollResult, PollError> {
        debug!(endpoint = %self.endpoint, watermark, "Polling for new interests");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("last_id", watermark)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Transport(format!("unexpected status {}", status)));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        PollResult::decode(&body)
    }
}
