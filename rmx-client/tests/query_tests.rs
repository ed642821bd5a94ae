//! Query evaluation tests

use std::sync::Arc;

use async_trait::async_trait;
use rmx_client::{
    ClientError, ClientResult, InMemoryTransport, ManagedObject, QueryExp, QueryExpr, QueryServer,
    RegistryBinding, RegistryConnection, RemoteRegistryAdapter, TransportError,
};
use rmx_protocol::{ObjectInstance, ObjectName, ProtocolError};
use serde_json::{json, Value};

fn name(s: &str) -> ObjectName {
    ObjectName::parse(s).unwrap()
}

fn registry() -> Arc<InMemoryTransport> {
    Arc::new(InMemoryTransport::with_objects([
        ManagedObject::new(name("app:type=Cache,id=1"), "org.app.Cache")
            .with_attribute("Enabled", json!(true)),
        ManagedObject::new(name("app:type=Cache,id=2"), "org.app.Cache")
            .with_attribute("Enabled", json!(false)),
        ManagedObject::new(name("app:type=Pool"), "org.app.Pool")
            .with_attribute("Enabled", json!(true)),
        ManagedObject::new(name("sys:type=Cache"), "org.sys.Cache"),
    ]))
}

/// Local registry answering every callback from the in-process agent
struct LocalRegistry {
    objects: Arc<InMemoryTransport>,
}

#[async_trait]
impl QueryServer for LocalRegistry {
    async fn get_object_instance(&self, name: &ObjectName) -> ClientResult<ObjectInstance> {
        let adapter = RemoteRegistryAdapter::new(self.objects.clone());
        adapter.get_object_instance(name).await
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ClientResult<Value> {
        self.objects
            .attribute(name, attribute)
            .await
            .ok_or_else(|| ClientError::unsupported("missing attribute"))
    }

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ClientResult<bool> {
        Ok(self.get_object_instance(name).await?.class_name.ends_with(class_name))
    }
}

#[tokio::test]
async fn test_query_by_class_through_standin() {
    let adapter = RemoteRegistryAdapter::new(registry());
    let caches = QueryExpr::class_eq("org.app.Cache");

    let names = adapter.query_names(None, Some(&caches)).await.unwrap();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&name("app:type=Cache,id=1")));
    assert!(names.contains(&name("app:type=Cache,id=2")));

    let instances = adapter
        .query_mbeans(Some(&name("*:*")), Some(&QueryExpr::class_matches("*.Cache").unwrap()))
        .await
        .unwrap();
    assert_eq!(instances.len(), 3);
    assert!(instances.iter().all(|i| i.class_name.ends_with("Cache")));
}

#[tokio::test]
async fn test_pattern_and_query_combine() {
    let adapter = RemoteRegistryAdapter::new(registry());
    let query = QueryExpr::class_eq("org.app.Pool").not();

    let names = adapter
        .query_names(Some(&name("app:*")), Some(&query))
        .await
        .unwrap();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&name("app:type=Pool")));
}

#[tokio::test]
async fn test_standin_rejects_other_callbacks() {
    let adapter = RemoteRegistryAdapter::new(registry());
    let enabled = QueryExpr::attribute_eq("Enabled", json!(true));

    let err = adapter.query_names(None, Some(&enabled)).await.unwrap_err();
    assert!(matches!(err, ClientError::Unsupported { ref operation } if operation == "get_attribute"));

    let err = adapter
        .query_mbeans(None, Some(&QueryExpr::instance_of("org.app.Cache")))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unsupported { ref operation } if operation == "is_instance_of"));
}

#[tokio::test]
async fn test_bound_registry_answers_every_callback() {
    let objects = registry();
    let local = Arc::new(LocalRegistry {
        objects: Arc::clone(&objects),
    });
    let adapter = RemoteRegistryAdapter::new(objects).with_binding(RegistryBinding::Bound(local));
    assert!(adapter.binding().is_bound());

    let enabled_caches = QueryExpr::attribute_eq("Enabled", json!(true))
        .and(QueryExpr::instance_of("Cache"));
    let names = adapter
        .query_names(Some(&name("app:*")), Some(&enabled_caches))
        .await
        .unwrap();
    assert_eq!(names.len(), 1);
    assert!(names.contains(&name("app:type=Cache,id=1")));
}

/// Expression failing with a fixed error
struct Failing(fn() -> ClientError);

#[async_trait]
impl QueryExp for Failing {
    async fn apply(&self, _name: &ObjectName, _server: &dyn QueryServer) -> ClientResult<bool> {
        Err((self.0)())
    }
}

#[tokio::test]
async fn test_query_errors_are_wrapped_or_passed_through() {
    let adapter = RemoteRegistryAdapter::new(registry());

    let not_found = Failing(|| {
        ClientError::Protocol(ProtocolError::InstanceNotFound {
            name: "app:type=Gone".to_string(),
        })
    });
    let err = adapter.query_names(None, Some(&not_found)).await.unwrap_err();
    match err {
        ClientError::Adapter { source, .. } => {
            let inner = source.downcast_ref::<ClientError>().unwrap();
            assert_eq!(inner.error_code(), "INSTANCE_NOT_FOUND");
        }
        other => panic!("expected an adapter error, got {:?}", other),
    }

    let timeout = Failing(|| ClientError::Transport(TransportError::Timeout { timeout_ms: 10 }));
    let err = adapter.query_names(None, Some(&timeout)).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn test_query_on_empty_match_set_never_calls_back() {
    let adapter = RemoteRegistryAdapter::new(registry());
    let unsupported = QueryExpr::attribute_eq("Enabled", json!(true));

    let names = adapter
        .query_names(Some(&name("nothing:*")), Some(&unsupported))
        .await
        .unwrap();
    assert!(names.is_empty());
}
