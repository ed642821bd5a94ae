//! In-process agent (same process, for testing)

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rmx_protocol::{
    AttributeSelector, ExecRequest, ListRequest, ObjectName, ReadRequest, Request, WriteRequest,
    STATUS_NOT_FOUND, STATUS_OK,
};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use super::{Transport, TransportResult};

/// Operation body; an `Err` is reported to the caller as a remote failure
pub type OperationHandler = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// A management object held by the in-process agent
#[derive(Clone)]
pub struct ManagedObject {
    name: ObjectName,
    class_name: String,
    description: Option<String>,
    attributes: BTreeMap<String, Value>,
    operations: BTreeMap<String, OperationHandler>,
}

impl ManagedObject {
    pub fn new(name: ObjectName, class_name: impl Into<String>) -> Self {
        Self {
            name,
            class_name: class_name.into(),
            description: None,
            attributes: BTreeMap::new(),
            operations: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_operation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// List entry in wire form
    fn info(&self) -> Value {
        let mut info = Map::new();
        info.insert("class".into(), self.class_name.clone().into());
        if let Some(desc) = &self.description {
            info.insert("desc".into(), desc.clone().into());
        }
        if !self.attributes.is_empty() {
            let attrs: Map<String, Value> = self
                .attributes
                .iter()
                .map(|(name, value)| {
                    (name.clone(), json!({"type": type_name(value), "rw": true}))
                })
                .collect();
            info.insert("attr".into(), Value::Object(attrs));
        }
        if !self.operations.is_empty() {
            let ops: Map<String, Value> = self
                .operations
                .keys()
                .map(|name| (name.clone(), json!({"args": [], "ret": "object"})))
                .collect();
            info.insert("op".into(), Value::Object(ops));
        }
        Value::Object(info)
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("attributes", &self.attributes)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "long",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Agent answering requests from an in-process registry
///
/// Replies use the same envelopes a remote agent sends, including 404 and
/// 500 error envelopes, so the adapter decodes them exactly as it would a
/// network reply. Objects keep their registration order.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    objects: RwLock<Vec<ManagedObject>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: impl IntoIterator<Item = ManagedObject>) -> Self {
        Self {
            objects: RwLock::new(objects.into_iter().collect()),
        }
    }

    /// Register an object, replacing any object with the same name
    pub async fn register(&self, object: ManagedObject) {
        let mut objects = self.objects.write().await;
        match objects.iter_mut().find(|o| o.name == object.name) {
            Some(existing) => *existing = object,
            None => objects.push(object),
        }
    }

    pub async fn unregister(&self, name: &ObjectName) -> bool {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|o| o.name != *name);
        objects.len() != before
    }

    /// Current value of an attribute
    pub async fn attribute(&self, name: &ObjectName, attribute: &str) -> Option<Value> {
        let objects = self.objects.read().await;
        objects
            .iter()
            .find(|o| o.name == *name)
            .and_then(|o| o.attributes.get(attribute).cloned())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn answer(&self, request: &Request) -> Value {
        match request {
            Request::Read(r) => self.read(r).await,
            Request::Write(r) => self.write(r).await,
            Request::Exec(r) => self.exec(r).await,
            Request::List(r) => self.list(r).await,
            Request::Search(r) => {
                let objects = self.objects.read().await;
                let names: Vec<Value> = objects
                    .iter()
                    .filter(|o| r.pattern.apply(&o.name))
                    .map(|o| o.name.canonical_string().into())
                    .collect();
                ok(Value::Array(names))
            }
        }
    }

    async fn read(&self, request: &ReadRequest) -> Value {
        let objects = self.objects.read().await;

        if request.name().is_pattern() {
            let matched: Map<String, Value> = objects
                .iter()
                .filter(|o| request.name().apply(&o.name))
                .map(|o| (o.name.canonical_string(), select(o, request.selector())))
                .collect();
            return ok(Value::Object(matched));
        }

        let Some(object) = objects.iter().find(|o| o.name == *request.name()) else {
            return instance_not_found(request.name());
        };

        let value = match request.selector() {
            AttributeSelector::Absent | AttributeSelector::Single(None) => {
                select(object, request.selector())
            }
            AttributeSelector::Single(Some(attribute)) => match object.attributes.get(attribute) {
                Some(value) => value.clone(),
                None => return attribute_not_found(request.name(), attribute),
            },
            AttributeSelector::Multiple(attributes) => {
                let mut values = Map::new();
                for attribute in attributes {
                    match object.attributes.get(attribute) {
                        Some(value) => {
                            values.insert(attribute.clone(), value.clone());
                        }
                        None => return attribute_not_found(request.name(), attribute),
                    }
                }
                Value::Object(values)
            }
        };

        match request.path() {
            None => ok(value),
            Some(path) => match path.project(&value) {
                Some(projected) => ok(projected),
                None => error(
                    STATUS_NOT_FOUND,
                    "PathNotFoundException",
                    format!("no value at path '{}' of {}", path, request.name()),
                ),
            },
        }
    }

    async fn write(&self, request: &WriteRequest) -> Value {
        let mut objects = self.objects.write().await;
        let Some(object) = objects.iter_mut().find(|o| o.name == request.name) else {
            return instance_not_found(&request.name);
        };
        match object.attributes.get_mut(&request.attribute) {
            Some(current) => ok(std::mem::replace(current, request.value.clone())),
            None => attribute_not_found(&request.name, &request.attribute),
        }
    }

    async fn exec(&self, request: &ExecRequest) -> Value {
        let handler = {
            let objects = self.objects.read().await;
            let Some(object) = objects.iter().find(|o| o.name == request.name) else {
                return instance_not_found(&request.name);
            };
            match object.operations.get(&request.operation) {
                Some(handler) => Arc::clone(handler),
                None => {
                    return error(
                        STATUS_NOT_FOUND,
                        "OperationNotFoundException",
                        format!("no operation '{}' on {}", request.operation, request.name),
                    )
                }
            }
        };

        let arguments = request.arguments.as_deref().unwrap_or(&[]);
        match handler(arguments) {
            Ok(value) => ok(value),
            Err(message) => error(500, "OperationFailedException", message),
        }
    }

    async fn list(&self, request: &ListRequest) -> Value {
        let objects = self.objects.read().await;
        let mut domains: Map<String, Value> = Map::new();
        for object in objects
            .iter()
            .filter(|o| request.name().map_or(true, |pattern| pattern.apply(&o.name)))
        {
            let entries = domains
                .entry(object.name.domain().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(entries) = entries {
                entries.insert(object.name.canonical_key_property_list(), object.info());
            }
        }
        ok(Value::Object(domains))
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn execute(&self, request: &Request) -> TransportResult<Value> {
        Ok(self.answer(request).await)
    }
}

/// Attribute map an object contributes to a read
fn select(object: &ManagedObject, selector: &AttributeSelector) -> Value {
    let wanted = |name: &str| match selector {
        AttributeSelector::Absent | AttributeSelector::Single(None) => true,
        AttributeSelector::Single(Some(attribute)) => attribute == name,
        AttributeSelector::Multiple(attributes) => attributes.iter().any(|a| a == name),
    };
    Value::Object(
        object
            .attributes
            .iter()
            .filter(|(name, _)| wanted(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    )
}

fn ok(value: Value) -> Value {
    json!({
        "value": value,
        "status": STATUS_OK,
        "timestamp": chrono::Utc::now().timestamp(),
    })
}

fn error(status: u16, error_type: &str, message: impl Into<String>) -> Value {
    json!({
        "status": status,
        "error_type": error_type,
        "error": message.into(),
        "timestamp": chrono::Utc::now().timestamp(),
    })
}

fn instance_not_found(name: &ObjectName) -> Value {
    error(STATUS_NOT_FOUND, "InstanceNotFoundException", name.canonical_string())
}

fn attribute_not_found(name: &ObjectName, attribute: &str) -> Value {
    error(
        STATUS_NOT_FOUND,
        "AttributeNotFoundException",
        format!("no attribute '{}' on {}", attribute, name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmx_protocol::{AttributePath, Response, SearchRequest};

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    fn agent() -> InMemoryTransport {
        InMemoryTransport::with_objects([
            ManagedObject::new(name("app:type=Cache"), "org.app.Cache")
                .with_attribute("Size", json!(3))
                .with_attribute("Stats", json!({"hits": 7, "misses": [1, 2]}))
                .with_operation("clear", |_| Ok(Value::Null)),
            ManagedObject::new(name("app:type=Pool"), "org.app.Pool")
                .with_attribute("Size", json!(8)),
        ])
    }

    #[tokio::test]
    async fn test_read_with_path() {
        let agent = agent();
        let request: Request = ReadRequest::new(name("app:type=Cache"), "Stats")
            .with_path(AttributePath::from_segments(["misses", "1"]))
            .into();
        let reply = agent.execute(&request).await.unwrap();
        assert_eq!(reply["status"], 200);
        assert_eq!(reply["value"], json!(2));
    }

    #[tokio::test]
    async fn test_missing_instance_envelope() {
        let agent = agent();
        let request: Request = ReadRequest::new(name("app:type=Gone"), "Size").into();
        let reply = agent.execute(&request).await.unwrap();
        assert_eq!(reply["status"], 404);
        assert_eq!(reply["error_type"], "InstanceNotFoundException");
        assert!(Response::decode(&request, &reply).is_err());
    }

    #[tokio::test]
    async fn test_search_keeps_registration_order() {
        let agent = agent();
        agent
            .register(ManagedObject::new(name("aaa:type=Late"), "org.Late"))
            .await;
        let request: Request = SearchRequest::new(ObjectName::wildcard()).into();
        let reply = agent.execute(&request).await.unwrap();
        assert_eq!(
            reply["value"],
            json!(["app:type=Cache", "app:type=Pool", "aaa:type=Late"])
        );
    }

    #[tokio::test]
    async fn test_write_returns_previous_value() {
        let agent = agent();
        let request: Request = WriteRequest::new(name("app:type=Pool"), "Size", json!(16)).into();
        let reply = agent.execute(&request).await.unwrap();
        assert_eq!(reply["value"], json!(8));
        assert_eq!(agent.attribute(&name("app:type=Pool"), "Size").await, Some(json!(16)));
    }

    #[tokio::test]
    async fn test_failing_operation() {
        let agent = InMemoryTransport::with_objects([ManagedObject::new(
            name("app:type=Job"),
            "org.app.Job",
        )
        .with_operation("run", |args| Err(format!("refusing {} arguments", args.len())))]);
        let request: Request = ExecRequest::new(name("app:type=Job"), "run", vec![json!(1)]).into();
        let reply = agent.execute(&request).await.unwrap();
        assert_eq!(reply["status"], 500);
        assert_eq!(reply["error"], "refusing 1 arguments");
    }

    #[tokio::test]
    async fn test_unregister() {
        let agent = agent();
        assert!(agent.unregister(&name("app:type=Pool")).await);
        assert!(!agent.unregister(&name("app:type=Pool")).await);
        assert_eq!(agent.len().await, 1);
    }
}
