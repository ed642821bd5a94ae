//! Error types for the RMX client

use std::error::Error as StdError;

use rmx_protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed cause carried by adapter and transport failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for registry operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for transport calls
pub type TransportResult<T> = Result<T, TransportError>;

/// Error category for grouping client failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Decode,
    Remote,
    Unsupported,
    Transport,
    Adapter,
    Configuration,
}

impl From<rmx_protocol::ErrorCategory> for ErrorCategory {
    fn from(category: rmx_protocol::ErrorCategory) -> Self {
        match category {
            rmx_protocol::ErrorCategory::Validation => ErrorCategory::Validation,
            rmx_protocol::ErrorCategory::NotFound => ErrorCategory::NotFound,
            rmx_protocol::ErrorCategory::Decode => ErrorCategory::Decode,
            rmx_protocol::ErrorCategory::Remote => ErrorCategory::Remote,
        }
    }
}

/// Failures raised by a transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The agent could not be reached
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// No reply within the configured time
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The agent answered with a non-success HTTP status
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// Any other failure, with its original cause
    #[error("{message}: {source}")]
    Other {
        message: String,
        #[source]
        source: BoxError,
    },
}

impl TransportError {
    pub fn other(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TransportError::Other {
            message: message.into(),
            source: source.into(),
        }
    }
}

/// Errors raised by registry operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request building or reply decoding failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The registry contract offers the operation but a remote client cannot
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The transport reported a recognized failure
    #[error("Transport failure: {0}")]
    Transport(TransportError),

    /// Any other failure, with its original cause
    #[error("{message}: {source}")]
    Adapter {
        message: String,
        #[source]
        source: BoxError,
    },

    /// The remote registry holds no objects, so it has no default domain
    #[error("Remote registry has no domains")]
    RegistryEmpty,

    /// A query expression could not be built
    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// Client configuration is unusable
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Configuration JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn unsupported(operation: impl Into<String>) -> Self {
        ClientError::Unsupported {
            operation: operation.into(),
        }
    }

    /// Unwrap a transport failure one level
    ///
    /// I/O, connection, timeout and HTTP failures, and an `Other` whose cause
    /// is itself a `TransportError`, surface as `Transport`. Everything else
    /// becomes `Adapter` with the original cause attached.
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Other { message, source } => match source.downcast::<TransportError>() {
                Ok(inner) => ClientError::Transport(*inner),
                Err(source) => ClientError::Adapter { message, source },
            },
            recognized => ClientError::Transport(recognized),
        }
    }

    /// Whether this error passes through query evaluation unchanged
    pub(crate) fn is_passthrough(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Adapter { .. } | ClientError::Unsupported { .. }
        )
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Protocol(e) => e.category().into(),
            ClientError::Unsupported { .. } => ErrorCategory::Unsupported,
            ClientError::Transport(_) => ErrorCategory::Transport,
            ClientError::Adapter { .. } => ErrorCategory::Adapter,
            ClientError::RegistryEmpty => ErrorCategory::NotFound,
            ClientError::InvalidQuery { .. } => ErrorCategory::Validation,
            ClientError::InvalidConfig { .. } | ClientError::Json(_) => {
                ErrorCategory::Configuration
            }
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Protocol(e) => e.error_code(),
            ClientError::Unsupported { .. } => "UNSUPPORTED_OPERATION",
            ClientError::Transport(_) => "TRANSPORT_ERROR",
            ClientError::Adapter { .. } => "ADAPTER_ERROR",
            ClientError::RegistryEmpty => "REGISTRY_EMPTY",
            ClientError::InvalidQuery { .. } => "INVALID_QUERY",
            ClientError::InvalidConfig { .. } => "INVALID_CONFIG",
            ClientError::Json(_) => "JSON_ERROR",
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::from_transport(err)
    }
}
