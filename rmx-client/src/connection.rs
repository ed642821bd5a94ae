//! Registry connection contract

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rmx_protocol::{Attribute, AttributeList, MBeanInfo, ObjectInstance, ObjectName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientResult;
use crate::query::QueryExp;

/// Connection to a management registry
///
/// Mirrors what a locally mounted registry offers, so query and
/// introspection code can run unchanged against a remote one.
#[async_trait]
pub trait RegistryConnection: Send + Sync {
    /// Instance registered under `name`
    async fn get_object_instance(&self, name: &ObjectName) -> ClientResult<ObjectInstance>;

    /// Instances matching `pattern` (everything when `None`) and `query`
    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> ClientResult<HashSet<ObjectInstance>>;

    /// Names matching `pattern` (everything when `None`) and `query`
    async fn query_names(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> ClientResult<HashSet<ObjectName>>;

    async fn is_registered(&self, name: &ObjectName) -> ClientResult<bool>;

    async fn get_mbean_count(&self) -> ClientResult<usize>;

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ClientResult<Value>;

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> ClientResult<AttributeList>;

    async fn set_attribute(&self, name: &ObjectName, attribute: Attribute) -> ClientResult<()>;

    /// Write several attributes; returns the attributes written
    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ClientResult<AttributeList>;

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[&str],
    ) -> ClientResult<Value>;

    async fn get_default_domain(&self) -> ClientResult<String>;

    /// Domains in the order their first object was seen
    async fn get_domains(&self) -> ClientResult<Vec<String>>;

    async fn get_mbean_info(&self, name: &ObjectName) -> ClientResult<MBeanInfo>;

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ClientResult<bool>;

    async fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
    ) -> ClientResult<ObjectInstance>;

    async fn unregister_mbean(&self, name: &ObjectName) -> ClientResult<()>;

    async fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: Arc<dyn NotificationListener>,
    ) -> ClientResult<()>;

    async fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: Arc<dyn NotificationListener>,
    ) -> ClientResult<()>;
}

/// Notification emitted by a management object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub source: ObjectName,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Receiver of notifications
pub trait NotificationListener: Send + Sync {
    fn handle_notification(&self, notification: &Notification);
}
