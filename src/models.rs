use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifies the logical cloud endpoint a connection belongs to.
/// Immutable for the lifetime of its manager; a changed identity means a
/// new manager instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    hub_host_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, hub_host_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hub_host_name: hub_host_name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hub_host_name(&self) -> &str {
        &self.hub_host_name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A freshly minted SAS token together with the identity it was minted for.
/// Consumed once per update.
#[derive(Clone)]
pub struct TokenCredentials {
    identity: Identity,
    token: String,
}

impl TokenCredentials {
    pub fn new(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: token.into(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Tokens are secrets; log a short preview only.
impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview = self.token.chars().take(8).collect::<String>();
        f.debug_struct("TokenCredentials")
            .field("identity", &self.identity)
            .field("token", &format!("{preview}..."))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    Amqp,
    AmqpWebSocket,
    Mqtt,
    MqttWebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Amqp => "AMQP",
            TransportKind::AmqpWebSocket => "AMQP over WebSocket",
            TransportKind::Mqtt => "MQTT",
            TransportKind::MqttWebSocket => "MQTT over WebSocket",
        };
        f.write_str(name)
    }
}

/// Proxy to tunnel a (typically WebSocket) transport through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub url: String,
}

/// One connection option. The ordered sequence of these is fixed at manager
/// construction; order encodes preference (e.g. plain AMQP before the
/// WebSocket fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    #[serde(default)]
    pub proxy: Option<ProxySettings>,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout: Duration,
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(20)
}

impl TransportConfig {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            proxy: None,
            operation_timeout: default_operation_timeout(),
        }
    }

    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
