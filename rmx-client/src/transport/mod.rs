//! Transports carrying requests to a management agent
//!
//! A transport takes canonical requests and hands back raw reply envelopes.
//! It knows nothing about reply semantics; decoding happens in the adapter.
//!
//! Two implementations ship with the crate:
//!
//! - [`HttpTransport`] POSTs requests to an agent URL
//! - [`InMemoryTransport`] answers from an in-process registry (same
//!   process, for testing)

mod http;
mod memory;

pub use http::HttpTransport;
pub use memory::{InMemoryTransport, ManagedObject, OperationHandler};

use async_trait::async_trait;
use rmx_protocol::Request;
use serde_json::Value;

pub use crate::error::{TransportError, TransportResult};

/// Transport interface
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name, used in log fields
    fn name(&self) -> &str;

    /// Send one request and return its reply envelope
    async fn execute(&self, request: &Request) -> TransportResult<Value>;

    /// Send several requests and return their envelopes in request order
    ///
    /// The default sends them one by one and stops at the first failure.
    async fn execute_batch(&self, requests: &[Request]) -> TransportResult<Vec<Value>> {
        execute_each(self, requests).await
    }
}

/// Send requests one at a time, failing on the first error
pub async fn execute_each<T>(transport: &T, requests: &[Request]) -> TransportResult<Vec<Value>>
where
    T: Transport + ?Sized,
{
    let mut replies = Vec::with_capacity(requests.len());
    for request in requests {
        replies.push(transport.execute(request).await?);
    }
    Ok(replies)
}
