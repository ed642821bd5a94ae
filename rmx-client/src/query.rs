//! Local query evaluation
//!
//! The agent only understands name patterns, so richer filters run on the
//! client. A [`QueryExp`] is applied to each candidate name and may call back
//! into a [`QueryServer`] for whatever it needs to know about the object.
//!
//! When no local registry is bound, the adapter answers those callbacks
//! through a short-lived [`StandinServer`]. The stand-in can only look up an
//! object's identity; every other callback fails with
//! [`ClientError::Unsupported`], because a query expression may be supplied
//! by anyone and must not silently evaluate against missing data.
//!
//! ```rust
//! use rmx_client::QueryExpr;
//! use rmx_protocol::ObjectName;
//!
//! let caches = QueryExpr::class_eq("org.app.Cache")
//!     .and(QueryExpr::name(ObjectName::parse("app:*").unwrap()))
//!     .and(QueryExpr::attribute_eq("Enabled", true.into()).not());
//! assert!(matches!(caches, QueryExpr::And(..)));
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use glob::Pattern;
use rmx_protocol::{ObjectInstance, ObjectName};
use serde_json::Value;

use crate::adapter::RemoteRegistryAdapter;
use crate::connection::RegistryConnection;
use crate::error::{ClientError, ClientResult};

/// Registry callbacks available to a query expression
#[async_trait]
pub trait QueryServer: Send + Sync {
    async fn get_object_instance(&self, name: &ObjectName) -> ClientResult<ObjectInstance>;

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ClientResult<Value>;

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ClientResult<bool>;
}

/// Boolean filter over object names
#[async_trait]
pub trait QueryExp: Send + Sync {
    async fn apply(&self, name: &ObjectName, server: &dyn QueryServer) -> ClientResult<bool>;
}

/// Built-in query expressions
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    /// Declared class equals the given name
    ClassEquals(String),
    /// Declared class matches a `*`/`?` glob
    ClassMatches(Pattern),
    /// Registry reports the object as an instance of the class
    InstanceOf(String),
    /// Attribute value equals the given JSON value
    AttributeEquals { attribute: String, value: Value },
    /// Name is selected by the pattern
    Name(ObjectName),
    And(Box<QueryExpr>, Box<QueryExpr>),
    Or(Box<QueryExpr>, Box<QueryExpr>),
    Not(Box<QueryExpr>),
}

impl QueryExpr {
    pub fn class_eq(class_name: impl Into<String>) -> Self {
        QueryExpr::ClassEquals(class_name.into())
    }

    pub fn class_matches(pattern: &str) -> ClientResult<Self> {
        Pattern::new(pattern)
            .map(QueryExpr::ClassMatches)
            .map_err(|e| ClientError::InvalidQuery {
                reason: format!("class pattern '{}': {}", pattern, e),
            })
    }

    pub fn instance_of(class_name: impl Into<String>) -> Self {
        QueryExpr::InstanceOf(class_name.into())
    }

    pub fn attribute_eq(attribute: impl Into<String>, value: Value) -> Self {
        QueryExpr::AttributeEquals {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn name(pattern: ObjectName) -> Self {
        QueryExpr::Name(pattern)
    }

    pub fn and(self, other: QueryExpr) -> Self {
        QueryExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: QueryExpr) -> Self {
        QueryExpr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        QueryExpr::Not(Box::new(self))
    }
}

#[async_trait]
impl QueryExp for QueryExpr {
    async fn apply(&self, name: &ObjectName, server: &dyn QueryServer) -> ClientResult<bool> {
        match self {
            QueryExpr::ClassEquals(class_name) => {
                Ok(server.get_object_instance(name).await?.class_name == *class_name)
            }
            QueryExpr::ClassMatches(pattern) => {
                let instance = server.get_object_instance(name).await?;
                Ok(pattern.matches(&instance.class_name))
            }
            QueryExpr::InstanceOf(class_name) => server.is_instance_of(name, class_name).await,
            QueryExpr::AttributeEquals { attribute, value } => {
                Ok(server.get_attribute(name, attribute).await? == *value)
            }
            QueryExpr::Name(pattern) => Ok(pattern.apply(name)),
            QueryExpr::And(left, right) => {
                Ok(left.apply(name, server).await? && right.apply(name, server).await?)
            }
            QueryExpr::Or(left, right) => {
                Ok(left.apply(name, server).await? || right.apply(name, server).await?)
            }
            QueryExpr::Not(inner) => Ok(!inner.apply(name, server).await?),
        }
    }
}

/// Local registry a query runs against
#[derive(Clone, Default)]
pub enum RegistryBinding {
    /// No local registry; a stand-in answers identity lookups per candidate
    #[default]
    Unbound,
    /// Callbacks go to this registry and no stand-in is created
    Bound(Arc<dyn QueryServer>),
}

impl RegistryBinding {
    pub fn is_bound(&self) -> bool {
        matches!(self, RegistryBinding::Bound(_))
    }
}

impl fmt::Debug for RegistryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryBinding::Unbound => f.write_str("Unbound"),
            RegistryBinding::Bound(_) => f.write_str("Bound(..)"),
        }
    }
}

/// Transient registry answering identity lookups through the adapter
pub struct StandinServer<'a> {
    adapter: &'a RemoteRegistryAdapter,
}

impl<'a> StandinServer<'a> {
    pub fn new(adapter: &'a RemoteRegistryAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl QueryServer for StandinServer<'_> {
    async fn get_object_instance(&self, name: &ObjectName) -> ClientResult<ObjectInstance> {
        RegistryConnection::get_object_instance(self.adapter, name).await
    }

    async fn get_attribute(&self, _name: &ObjectName, _attribute: &str) -> ClientResult<Value> {
        Err(ClientError::unsupported("get_attribute"))
    }

    async fn is_instance_of(&self, _name: &ObjectName, _class_name: &str) -> ClientResult<bool> {
        Err(ClientError::unsupported("is_instance_of"))
    }
}

/// Apply `query` to `name` against the adapter's registry binding
///
/// Transport, adapter and unsupported-callback errors pass through as they
/// are; anything else is wrapped as an adapter error.
pub(crate) async fn evaluate(
    adapter: &RemoteRegistryAdapter,
    query: &dyn QueryExp,
    name: &ObjectName,
) -> ClientResult<bool> {
    let result = match adapter.binding() {
        RegistryBinding::Bound(server) => query.apply(name, server.as_ref()).await,
        RegistryBinding::Unbound => {
            let standin = StandinServer::new(adapter);
            query.apply(name, &standin).await
        }
    };

    result.map_err(|err| {
        if err.is_passthrough() {
            err
        } else {
            ClientError::Adapter {
                message: format!("query evaluation failed for {}", name),
                source: Box::new(err),
            }
        }
    })
}
