//! Client configuration tests

use rmx_client::{ClientConfig, ClientError, RemoteRegistryAdapter, Transport, TransportConfig};

#[test]
fn test_defaults() {
    let config = ClientConfig::default();

    assert_eq!(config.transport.url, "http://localhost:8778/rmx");
    assert_eq!(config.transport.timeout_ms, 30000);
    assert!(config.transport.batching);
    assert!(config.read.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_fills_defaults() {
    let config = ClientConfig::from_json(
        r#"{
            "transport": {"url": "https://agent.example:8443/rmx", "batching": false},
            "read": {"maxDepth": 4, "ignoreErrors": true}
        }"#,
    )
    .unwrap();

    assert_eq!(config.transport.url, "https://agent.example:8443/rmx");
    assert_eq!(config.transport.timeout_ms, 30000);
    assert!(!config.transport.batching);
    assert_eq!(config.read.max_depth, Some(4));
    assert_eq!(config.read.ignore_errors, Some(true));
    assert_eq!(config.read.max_objects, None);

    let empty = ClientConfig::from_json("{}").unwrap();
    assert_eq!(empty, ClientConfig::default());
}

#[test]
fn test_invalid_configs() {
    let err = ClientConfig::from_json(r#"{"transport": {"url": "ftp://agent"}}"#).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");

    let err = ClientConfig::from_json(r#"{"transport": {"timeout_ms": 0}}"#).unwrap_err();
    assert!(matches!(err, ClientError::InvalidConfig { .. }));

    let err = ClientConfig::from_json("not json").unwrap_err();
    assert_eq!(err.error_code(), "JSON_ERROR");
}

#[test]
fn test_adapter_from_config() {
    let config = ClientConfig {
        transport: TransportConfig {
            url: "http://127.0.0.1:8778/rmx".to_string(),
            timeout_ms: 1000,
            batching: true,
        },
        ..ClientConfig::default()
    };
    let adapter = RemoteRegistryAdapter::from_config(&config).unwrap();
    assert_eq!(adapter.transport().name(), "http");
    assert!(!adapter.binding().is_bound());

    let bad = ClientConfig {
        transport: TransportConfig {
            timeout_ms: 0,
            ..TransportConfig::default()
        },
        ..ClientConfig::default()
    };
    assert!(RemoteRegistryAdapter::from_config(&bad).is_err());
}
