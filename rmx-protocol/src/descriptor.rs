//! Instance descriptors and introspection metadata

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};
use crate::name::ObjectName;

/// Keys of a list entry that carry introspection data beyond the class
const INFO_KEYS: &[&str] = &["desc", "attr", "op", "notif"];

/// A management object as the registry contract reports it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectInstance {
    pub name: ObjectName,
    pub class_name: String,
}

impl ObjectInstance {
    pub fn new(name: ObjectName, class_name: impl Into<String>) -> Self {
        Self {
            name,
            class_name: class_name.into(),
        }
    }
}

/// One entry of a list reply
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDescriptor {
    pub name: ObjectName,
    pub class_name: String,
    pub info: Option<MBeanInfo>,
}

impl InstanceDescriptor {
    /// Decode the entry the agent lists for `name`
    ///
    /// The entry must be a map with a `class` string. The introspection
    /// block is attached when the entry carries any of `desc`, `attr`, `op`
    /// or `notif`.
    pub fn decode(name: ObjectName, entry: &Value) -> ProtocolResult<Self> {
        let map = entry
            .as_object()
            .ok_or_else(|| ProtocolError::decode(format!("list entry for {}", name), entry))?;

        let class_name = map
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProtocolError::decode(format!("list entry for {} without a class", name), entry)
            })?
            .to_string();

        let info = if INFO_KEYS.iter().any(|k| map.contains_key(*k)) {
            let info: MBeanInfo = serde_json::from_value(entry.clone()).map_err(|e| {
                ProtocolError::decode(format!("introspection data for {} ({})", name, e), entry)
            })?;
            Some(info)
        } else {
            None
        };

        Ok(Self {
            name,
            class_name,
            info,
        })
    }

    pub fn to_instance(&self) -> ObjectInstance {
        ObjectInstance::new(self.name.clone(), self.class_name.clone())
    }
}

/// Introspection block of a management object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MBeanInfo {
    #[serde(rename = "class")]
    pub class_name: String,

    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "attr", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeInfo>,

    #[serde(rename = "op", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, OperationSignatures>,

    #[serde(rename = "notif", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notifications: BTreeMap<String, NotificationInfo>,
}

impl MBeanInfo {
    /// All signatures declared for an operation name
    pub fn operation(&self, name: &str) -> &[OperationInfo] {
        self.operations
            .get(name)
            .map(OperationSignatures::signatures)
            .unwrap_or(&[])
    }
}

/// Declared attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInfo {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the attribute is writable
    #[serde(default)]
    pub rw: bool,
}

/// Operation entry; overloaded operations arrive as an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationSignatures {
    Single(OperationInfo),
    Overloaded(Vec<OperationInfo>),
}

impl OperationSignatures {
    pub fn signatures(&self) -> &[OperationInfo] {
        match self {
            OperationSignatures::Single(op) => std::slice::from_ref(op),
            OperationSignatures::Overloaded(ops) => ops,
        }
    }
}

/// One operation signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    #[serde(default)]
    pub args: Vec<ArgumentInfo>,

    #[serde(rename = "ret")]
    pub return_type: String,

    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationInfo {
    #[serde(default)]
    pub types: Vec<String>,

    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
