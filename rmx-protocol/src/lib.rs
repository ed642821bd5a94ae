//! # RMX Protocol - Remote Management eXchange
//!
//! Data model of a JSON management protocol spoken over a request/reply
//! transport:
//!
//! - **Object names**: `domain:key=value,...` identifiers and the wildcard
//!   patterns that select them
//! - **Requests**: read, write, exec, list and search, with their wire maps
//! - **Replies**: status envelopes decoded into typed responses
//!
//! Nothing here performs I/O. The `rmx-client` crate moves requests over a
//! transport and exposes them as a registry connection.
//!
//! ## Example
//!
//! ```rust
//! use rmx_protocol::{ObjectName, ReadRequest, ReadValue, Request, Response};
//! use serde_json::json;
//!
//! let name = ObjectName::parse("runtime:type=Memory").unwrap();
//! let request: Request = ReadRequest::new(name, "HeapMemoryUsage").into();
//!
//! let wire = request.to_value();
//! assert_eq!(wire["type"], "read");
//! assert_eq!(wire["mbean"], "runtime:type=Memory");
//!
//! let envelope = json!({"status": 200, "timestamp": 1700000000, "value": {"used": 42}});
//! let read = Response::decode(&request, &envelope).unwrap().into_read().unwrap();
//! assert_eq!(read.value, ReadValue::Single(json!({"used": 42})));
//! ```

pub mod descriptor;
pub mod error;
pub mod name;
pub mod path;
pub mod request;
pub mod response;

pub use descriptor::{
    ArgumentInfo, AttributeInfo, InstanceDescriptor, MBeanInfo, NotificationInfo, ObjectInstance,
    OperationInfo, OperationSignatures,
};
pub use error::{ErrorCategory, ProtocolError, ProtocolResult};
pub use name::ObjectName;
pub use path::AttributePath;
pub use request::{
    AttributeSelector, ExecRequest, ListRequest, ProcessingOptions, ReadRequest, Request,
    RequestType, SearchRequest, WriteRequest,
};
pub use response::{
    Attribute, AttributeList, ExecResponse, ListResponse, ReadResponse, ReadValue, Reply,
    Response, SearchResponse, WriteResponse, STATUS_NOT_FOUND, STATUS_OK,
};
