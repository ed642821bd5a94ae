//! RMX Client - remote management registry access
//!
//! The client side of RMX:
//! - Moves protocol requests to an agent through a [`Transport`]
//! - Decodes replies into registry results
//! - Presents the remote registry as a [`RegistryConnection`]
//! - Evaluates query expressions locally against remote objects
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              RegistryConnection               │
//! │                                              │
//! │   ┌──────────────────────┐  ┌─────────────┐  │
//! │   │ RemoteRegistryAdapter│──│ Query shim  │  │
//! │   └──────────┬───────────┘  └─────────────┘  │
//! │              │ rmx-protocol requests          │
//! │   ┌──────────▼────────────────────────────┐  │
//! │   │           TRANSPORT LAYER             │  │
//! │   │    ┌──────┐          ┌───────────┐    │  │
//! │   │    │ HTTP │          │ In-memory │    │  │
//! │   │    └──────┘          └───────────┘    │  │
//! │   └───────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rmx_client::{ClientConfig, RegistryConnection, RemoteRegistryAdapter};
//! use rmx_protocol::ObjectName;
//!
//! let adapter = RemoteRegistryAdapter::from_config(&ClientConfig::default())?;
//!
//! let memory = ObjectName::parse("runtime:type=Memory")?;
//! let heap = adapter.get_attribute(&memory, "HeapMemoryUsage").await?;
//!
//! for domain in adapter.get_domains().await? {
//!     println!("{}", domain);
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod query;
pub mod transport;

pub use adapter::RemoteRegistryAdapter;
pub use config::{ClientConfig, TransportConfig};
pub use connection::{Notification, NotificationListener, RegistryConnection};
pub use error::{BoxError, ClientError, ClientResult, ErrorCategory, TransportError, TransportResult};
pub use query::{QueryExp, QueryExpr, QueryServer, RegistryBinding, StandinServer};
pub use transport::{HttpTransport, InMemoryTransport, ManagedObject, Transport};
