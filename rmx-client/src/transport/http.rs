//! HTTP transport

use std::time::Duration;

use async_trait::async_trait;
use rmx_protocol::{ProtocolError, Request};
use serde_json::Value;

use super::{execute_each, Transport, TransportError, TransportResult};
use crate::config::TransportConfig;

/// Posts canonical request JSON to an agent endpoint
///
/// A single request goes out as one object, a batch as one array. The reply
/// body must be an envelope (or an array of envelopes for a batch). No
/// retries and no authentication.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    timeout_ms: u64,
    batching: bool,
}

impl HttpTransport {
    /// Transport for `url` with default timeout and batching
    pub fn new(url: &str) -> TransportResult<Self> {
        Self::from_config(&TransportConfig {
            url: url.to_string(),
            ..TransportConfig::default()
        })
    }

    pub fn from_config(config: &TransportConfig) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TransportError::other("failed to create HTTP client", e))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout_ms: config.timeout_ms,
            batching: config.batching,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, body: &Value) -> TransportResult<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| self.map_error(e))
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: format!("{}: {}", self.url, err),
            }
        } else if let Some(status) = err.status() {
            TransportError::Http {
                status: status.as_u16(),
            }
        } else {
            TransportError::other(format!("request to {} failed", self.url), err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, request: &Request) -> TransportResult<Value> {
        self.post(&request.to_value()).await
    }

    async fn execute_batch(&self, requests: &[Request]) -> TransportResult<Vec<Value>> {
        if !self.batching {
            return execute_each(self, requests).await;
        }

        let body = Value::Array(requests.iter().map(Request::to_value).collect());
        match self.post(&body).await? {
            Value::Array(replies) => Ok(replies),
            other => Err(TransportError::other(
                "batch reply",
                ProtocolError::ProtocolDecode {
                    reason: "batch reply that is not an array".to_string(),
                    fragment: other,
                },
            )),
        }
    }
}
