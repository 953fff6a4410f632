use std::time::Duration;

use cloudlink::{Identity, ProxySettings, TokenCredentials, TransportConfig, TransportKind};

#[test]
fn transport_kinds_have_wire_display_names() {
    assert_eq!(TransportKind::Amqp.to_string(), "AMQP");
    assert_eq!(
        TransportKind::AmqpWebSocket.to_string(),
        "AMQP over WebSocket"
    );
    assert_eq!(TransportKind::Mqtt.to_string(), "MQTT");
    assert_eq!(
        TransportKind::MqttWebSocket.to_string(),
        "MQTT over WebSocket"
    );
}

#[test]
fn identity_displays_as_its_id() {
    let identity = Identity::new("edge-agent", "edgehub.example.com");
    assert_eq!(identity.to_string(), "edge-agent");
    assert_eq!(identity.hub_host_name(), "edgehub.example.com");
}

#[test]
fn credentials_debug_redacts_the_token() {
    let credentials = TokenCredentials::new(
        Identity::new("edge-agent", "edgehub.example.com"),
        "SharedAccessSignature sr=edgehub.example.com&sig=verysecret&se=1700000000",
    );
    let printed = format!("{credentials:?}");
    assert!(printed.contains("SharedAc..."));
    assert!(!printed.contains("verysecret"));
}

#[test]
fn transport_configs_deserialize_with_defaults_preserving_order() {
    let json = r#"[
        {"kind": "Amqp"},
        {"kind": "AmqpWebSocket", "proxy": {"url": "http://proxy.local:8080"}}
    ]"#;
    let configs: Vec<TransportConfig> = serde_json::from_str(json).unwrap();

    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].kind, TransportKind::Amqp);
    assert_eq!(configs[0].proxy, None);
    assert_eq!(configs[0].operation_timeout, Duration::from_secs(20));
    assert_eq!(configs[1].kind, TransportKind::AmqpWebSocket);
    assert_eq!(
        configs[1].proxy,
        Some(ProxySettings {
            url: "http://proxy.local:8080".into()
        })
    );
}

#[test]
fn builder_overrides_stick() {
    let config = TransportConfig::new(TransportKind::Mqtt)
        .with_proxy(ProxySettings {
            url: "http://proxy.local:8080".into(),
        })
        .with_operation_timeout(Duration::from_secs(5));
    assert_eq!(config.kind, TransportKind::Mqtt);
    assert!(config.proxy.is_some());
    assert_eq!(config.operation_timeout, Duration::from_secs(5));
}
