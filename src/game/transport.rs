//! HTTP transport for the game server.
//!
//! [`GameTransport`] is the seam between the session client and the network:
//! it POSTs a JSON payload and hands back the raw status and body. Anything
//! that fails before a status line arrives is a transport error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::GameConfig;
use crate::error::{PilotError, Result};

/// Raw HTTP reply, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one request to the game server.
#[async_trait]
pub trait GameTransport: Send + Sync {
    /// POST `payload` to `path`, with `session` in the session header when set.
    ///
    /// Returns `Err` only when no HTTP reply was received.
    async fn post(&self, path: &str, session: Option<&str>, payload: &Value) -> Result<HttpReply>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    session_header: String,
}

impl HttpTransport {
    /// Create a transport for `base_url`.
    pub fn new(base_url: &str, session_header: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PilotError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_header: session_header.to_string(),
        })
    }

    /// Create a transport from the game configuration.
    pub fn from_config(config: &GameConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.session_header,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl GameTransport for HttpTransport {
    async fn post(&self, path: &str, session: Option<&str>, payload: &Value) -> Result<HttpReply> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, has_session = session.is_some(), "POST");

        let mut request = self.client.post(&url).json(payload);
        if let Some(id) = session {
            request = request.header(self.session_header.as_str(), id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PilotError::Connection(format!("{}: {}", url, e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PilotError::Connection(format!("{}: reading body: {}", url, e)))?;

        Ok(HttpReply { status, body })
    }
}
