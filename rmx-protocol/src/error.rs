//! Error types for the RMX protocol model
//!
//! Every variant carries a stable error code and a category so that callers
//! can switch on failures without matching message text.
//!
//! # Example
//!
//! ```rust
//! use rmx_protocol::{ObjectName, ErrorCategory};
//!
//! let err = ObjectName::parse("no-separator").unwrap_err();
//! assert_eq!(err.error_code(), "MALFORMED_NAME");
//! assert_eq!(err.category(), ErrorCategory::Validation);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input could not be parsed or was used incorrectly
    Validation,
    /// The addressed management object does not exist
    NotFound,
    /// The peer answered with something we cannot interpret
    Decode,
    /// The peer reported a failure of its own
    Remote,
}

/// Errors raised while building requests or decoding replies
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Object name or pattern could not be parsed
    #[error("Malformed object name '{name}': {reason}")]
    MalformedName { name: String, reason: String },

    /// API used in a state that does not support the call
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    /// Reply (or inbound request map) has an unexpected shape
    #[error("Cannot decode {reason}: {fragment}")]
    ProtocolDecode { reason: String, fragment: Value },

    /// No management object matched where exactly one was expected
    #[error("Instance not found: '{name}'")]
    InstanceNotFound { name: String },

    /// The agent answered with an error status
    #[error("Remote failure (status {status}, {error_type}): {message}")]
    RemoteFailure {
        status: u16,
        error_type: String,
        message: String,
    },
}

impl ProtocolError {
    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        ProtocolError::MalformedName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>, fragment: &Value) -> Self {
        ProtocolError::ProtocolDecode {
            reason: reason.into(),
            fragment: fragment.clone(),
        }
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProtocolError::MalformedName { .. } | ProtocolError::InvalidState { .. } => {
                ErrorCategory::Validation
            }
            ProtocolError::InstanceNotFound { .. } => ErrorCategory::NotFound,
            ProtocolError::ProtocolDecode { .. } => ErrorCategory::Decode,
            ProtocolError::RemoteFailure { .. } => ErrorCategory::Remote,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::MalformedName { .. } => "MALFORMED_NAME",
            ProtocolError::InvalidState { .. } => "INVALID_STATE",
            ProtocolError::ProtocolDecode { .. } => "PROTOCOL_DECODE",
            ProtocolError::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
            ProtocolError::RemoteFailure { .. } => "REMOTE_FAILURE",
        }
    }
}
