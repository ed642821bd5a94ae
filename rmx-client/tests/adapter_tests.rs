//! Remote registry adapter tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rmx_client::{
    ClientError, InMemoryTransport, ManagedObject, RegistryConnection, RemoteRegistryAdapter,
    Transport, TransportError, TransportResult,
};
use rmx_protocol::{Attribute, ObjectName, ProcessingOptions, ProtocolError, Request};
use serde_json::{json, Value};
use tokio::sync::Mutex;

fn name(s: &str) -> ObjectName {
    ObjectName::parse(s).unwrap()
}

fn registry() -> Arc<InMemoryTransport> {
    Arc::new(InMemoryTransport::with_objects([
        ManagedObject::new(name("a:type=1"), "org.a.One")
            .with_description("first")
            .with_attribute("Size", json!(10))
            .with_attribute("Name", json!("one"))
            .with_attribute("Limit", json!(100)),
        ManagedObject::new(name("b:type=2"), "org.b.Two")
            .with_attribute("Enabled", json!(true))
            .with_operation("add", |args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(json!(sum))
            }),
        ManagedObject::new(name("a:type=3"), "org.a.Three"),
    ]))
}

fn adapter(transport: Arc<InMemoryTransport>) -> RemoteRegistryAdapter {
    RemoteRegistryAdapter::new(transport)
}

/// Fails the n-th call, delegating every other call
struct FailingTransport {
    inner: Arc<InMemoryTransport>,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl Transport for FailingTransport {
    fn name(&self) -> &str {
        "failing"
    }

    async fn execute(&self, request: &Request) -> TransportResult<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(TransportError::Connection {
                message: "agent went away".to_string(),
            });
        }
        self.inner.execute(request).await
    }
}

/// Records every request it forwards
struct RecordingTransport {
    inner: Arc<InMemoryTransport>,
    sent: Mutex<Vec<Value>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, request: &Request) -> TransportResult<Value> {
        self.sent.lock().await.push(request.to_value());
        self.inner.execute(request).await
    }
}

#[tokio::test]
async fn test_domains_in_first_seen_order() {
    let adapter = adapter(registry());

    let domains = adapter.get_domains().await.unwrap();
    assert_eq!(domains, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(adapter.get_default_domain().await.unwrap(), "a");
}

#[tokio::test]
async fn test_empty_registry_has_no_default_domain() {
    let adapter = adapter(Arc::new(InMemoryTransport::new()));

    assert!(adapter.get_domains().await.unwrap().is_empty());
    let err = adapter.get_default_domain().await.unwrap_err();
    assert!(matches!(err, ClientError::RegistryEmpty));
    assert_eq!(adapter.get_mbean_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_object_instance() {
    let adapter = adapter(registry());

    let instance = adapter.get_object_instance(&name("b:type=2")).await.unwrap();
    assert_eq!(instance.name, name("b:type=2"));
    assert_eq!(instance.class_name, "org.b.Two");

    // The instance carries the requested name, even for a pattern
    let pattern = name("a:*");
    let instance = adapter.get_object_instance(&pattern).await.unwrap();
    assert_eq!(instance.name, pattern);
    assert!(instance.class_name.starts_with("org.a."));

    let err = adapter.get_object_instance(&name("c:type=9")).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::InstanceNotFound { .. })
    ));
}

#[tokio::test]
async fn test_query_names_and_count() {
    let adapter = adapter(registry());

    let all = adapter.query_names(None, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(adapter.get_mbean_count().await.unwrap(), 3);

    let in_a = adapter.query_names(Some(&name("a:*")), None).await.unwrap();
    assert_eq!(in_a.len(), 2);
    assert!(in_a.contains(&name("a:type=1")));
    assert!(in_a.contains(&name("a:type=3")));

    let none = adapter.query_names(Some(&name("zzz:*")), None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_query_mbeans_by_pattern() {
    let adapter = adapter(registry());

    let instances = adapter.query_mbeans(Some(&name("*:type=3")), None).await.unwrap();
    assert_eq!(instances.len(), 1);
    let instance = instances.iter().next().unwrap();
    assert_eq!(instance.class_name, "org.a.Three");

    let all = adapter.query_mbeans(None, None).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_is_registered() {
    let adapter = adapter(registry());

    assert!(adapter.is_registered(&name("a:type=1")).await.unwrap());
    assert!(!adapter.is_registered(&name("a:type=7")).await.unwrap());
}

#[tokio::test]
async fn test_get_attributes() {
    let adapter = adapter(registry());
    let target = name("a:type=1");

    assert_eq!(adapter.get_attribute(&target, "Size").await.unwrap(), json!(10));

    let single = adapter.get_attributes(&target, &["Name"]).await.unwrap();
    assert_eq!(single, vec![Attribute::new("Name", json!("one"))]);

    let several = adapter
        .get_attributes(&target, &["Limit", "Size"])
        .await
        .unwrap();
    assert_eq!(
        several,
        vec![
            Attribute::new("Limit", json!(100)),
            Attribute::new("Size", json!(10)),
        ]
    );

    assert!(adapter.get_attributes(&target, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_attribute_is_remote_failure() {
    let adapter = adapter(registry());

    let err = adapter
        .get_attribute(&name("a:type=1"), "Nope")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::RemoteFailure { status: 404, .. })
    ));

    let err = adapter
        .get_attribute(&name("a:type=404"), "Size")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSTANCE_NOT_FOUND");
}

#[tokio::test]
async fn test_set_attributes() {
    let transport = registry();
    let adapter = adapter(Arc::clone(&transport));
    let target = name("a:type=1");

    adapter
        .set_attribute(&target, Attribute::new("Size", json!(11)))
        .await
        .unwrap();
    assert_eq!(transport.attribute(&target, "Size").await, Some(json!(11)));

    let written = adapter
        .set_attributes(
            &target,
            vec![
                Attribute::new("Size", json!(12)),
                Attribute::new("Name", Value::Null),
            ],
        )
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(transport.attribute(&target, "Size").await, Some(json!(12)));
    assert_eq!(transport.attribute(&target, "Name").await, Some(Value::Null));
}

#[tokio::test]
async fn test_set_attributes_fails_as_a_whole() {
    let inner = registry();
    let transport = Arc::new(FailingTransport {
        inner: Arc::clone(&inner),
        calls: AtomicUsize::new(0),
        fail_on: 2,
    });
    let adapter = RemoteRegistryAdapter::new(transport);
    let target = name("a:type=1");

    let err = adapter
        .set_attributes(
            &target,
            vec![
                Attribute::new("Size", json!(1)),
                Attribute::new("Name", json!("two")),
                Attribute::new("Limit", json!(3)),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Connection { .. })
    ));
    // Writes are not rolled back; the third was never sent
    assert_eq!(inner.attribute(&target, "Size").await, Some(json!(1)));
    assert_eq!(inner.attribute(&target, "Limit").await, Some(json!(100)));
}

#[tokio::test]
async fn test_set_attributes_fails_on_error_entry() {
    let transport = registry();
    let adapter = adapter(Arc::clone(&transport));
    let target = name("a:type=1");

    let err = adapter
        .set_attributes(
            &target,
            vec![
                Attribute::new("Size", json!(20)),
                Attribute::new("Nope", json!(1)),
                Attribute::new("Limit", json!(30)),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::RemoteFailure { status: 404, .. })
    ));
    // The transport call succeeded, so every valid entry was applied
    assert_eq!(transport.attribute(&target, "Size").await, Some(json!(20)));
    assert_eq!(transport.attribute(&target, "Limit").await, Some(json!(30)));
}

#[tokio::test]
async fn test_get_attributes_sends_one_read() {
    let transport = Arc::new(RecordingTransport {
        inner: registry(),
        sent: Mutex::new(Vec::new()),
    });
    let adapter = RemoteRegistryAdapter::new(Arc::clone(&transport) as Arc<dyn Transport>);

    let values = adapter
        .get_attributes(&name("a:type=1"), &["Size"])
        .await
        .unwrap();
    assert_eq!(values, vec![Attribute::new("Size", json!(10))]);

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["attribute"], json!("Size"));
}

#[tokio::test]
async fn test_invoke_ignores_signature() {
    let adapter = adapter(registry());

    let sum = adapter
        .invoke(
            &name("b:type=2"),
            "add",
            &[json!(2), json!(5)],
            &["long", "long"],
        )
        .await
        .unwrap();
    assert_eq!(sum, json!(7));

    let err = adapter
        .invoke(&name("b:type=2"), "missing", &[], &[])
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "REMOTE_FAILURE");
}

#[tokio::test]
async fn test_mbean_info_and_instance_of() {
    let adapter = adapter(registry());

    let info = adapter.get_mbean_info(&name("a:type=1")).await.unwrap();
    assert_eq!(info.class_name, "org.a.One");
    assert_eq!(info.description.as_deref(), Some("first"));
    assert!(info.attributes.contains_key("Limit"));

    let bare = adapter.get_mbean_info(&name("a:type=3")).await.unwrap();
    assert_eq!(bare.class_name, "org.a.Three");
    assert!(bare.attributes.is_empty());

    let ops = adapter.get_mbean_info(&name("b:type=2")).await.unwrap();
    assert_eq!(ops.operation("add").len(), 1);

    assert!(adapter.is_instance_of(&name("a:type=1"), "org.a.One").await.unwrap());
    assert!(!adapter.is_instance_of(&name("a:type=1"), "org.a.Base").await.unwrap());
}

#[tokio::test]
async fn test_unsupported_operations() {
    let adapter = adapter(registry());
    let target = name("a:type=1");

    let err = adapter.create_mbean("org.a.New", Some(&target)).await.unwrap_err();
    assert!(matches!(err, ClientError::Unsupported { ref operation } if operation == "create_mbean"));

    let err = adapter.unregister_mbean(&target).await.unwrap_err();
    assert!(matches!(err, ClientError::Unsupported { ref operation } if operation == "unregister_mbean"));
}

#[tokio::test]
async fn test_read_defaults_are_merged() {
    let transport = Arc::new(RecordingTransport {
        inner: registry(),
        sent: Mutex::new(Vec::new()),
    });
    let adapter = RemoteRegistryAdapter::new(Arc::clone(&transport) as Arc<dyn Transport>)
        .with_read_defaults(ProcessingOptions {
            max_depth: Some(3),
            ..ProcessingOptions::default()
        });

    adapter.get_attribute(&name("a:type=1"), "Size").await.unwrap();

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["type"], "read");
    assert_eq!(sent[0]["config"], json!({"maxDepth": 3}));
}

#[tokio::test]
async fn test_unrecognized_transport_cause_is_adapter_error() {
    struct BrokenTransport;

    #[async_trait]
    impl Transport for BrokenTransport {
        fn name(&self) -> &str {
            "broken"
        }

        async fn execute(&self, _request: &Request) -> TransportResult<Value> {
            Err(TransportError::other(
                "garbled reply",
                std::fmt::Error,
            ))
        }
    }

    let adapter = RemoteRegistryAdapter::new(Arc::new(BrokenTransport));
    let err = adapter.get_domains().await.unwrap_err();
    assert!(matches!(err, ClientError::Adapter { ref message, .. } if message == "garbled reply"));
}

#[tokio::test]
async fn test_notification_listeners_are_unsupported() {
    use rmx_client::{Notification, NotificationListener};

    struct Collector(std::sync::Mutex<Vec<String>>);

    impl NotificationListener for Collector {
        fn handle_notification(&self, notification: &Notification) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(notification.notification_type.clone());
            }
        }
    }

    let adapter = adapter(registry());
    let listener = Arc::new(Collector(std::sync::Mutex::new(Vec::new())));

    let err = adapter
        .add_notification_listener(&name("a:type=1"), listener.clone())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");

    let err = adapter
        .remove_notification_listener(&name("a:type=1"), listener.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Unsupported { ref operation } if operation == "remove_notification_listener"
    ));
    assert!(listener.0.lock().unwrap().is_empty());
}
