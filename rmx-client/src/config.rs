//! Configuration for the RMX client

use rmx_protocol::ProcessingOptions;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Main client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Processing options merged into every read the adapter issues
    #[serde(default)]
    pub read: ProcessingOptions,
}

impl ClientConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> ClientResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.transport.validate()
    }
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Agent endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Send batches as one array instead of one request per entry
    #[serde(default = "default_true")]
    pub batching: bool,
}

fn default_url() -> String { "http://localhost:8778/rmx".to_string() }
fn default_timeout() -> u64 { 30000 }
fn default_true() -> bool { true }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_ms: default_timeout(),
            batching: true,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> ClientResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig {
                reason: format!("agent url '{}' is not an http(s) url", self.url),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::InvalidConfig {
                reason: "timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
