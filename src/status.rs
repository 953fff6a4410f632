use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Application-visible lifecycle status of a cloud connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    ConnectionEstablished,
    Disconnected,
    DisconnectedTokenExpired,
    TokenNearExpiry,
}

/// Raw connection state as reported by a transport implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawConnectionState {
    Connected,
    Disconnected,
}

/// Why a transport reported a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    ConnectionOk,
    ExpiredSasToken,
    CommunicationError,
    RetryExpired,
    NoNetwork,
}

/// One status notification, tagged with the identity id so a registry
/// holding many managers can route it.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub client_id: String,
    pub status: ConnectionStatus,
}

/// Maps raw transport events into [`ConnectionStatus`] notifications.
///
/// Carries one piece of state: the callback gate. The manager closes the
/// gate before starting a handle swap and reopens it once the swap is
/// complete, so events raised against a handle that is about to be
/// discarded are silently dropped.
pub struct StatusTranslator {
    client_id: String,
    gate: AtomicBool,
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusTranslator {
    /// The gate starts closed; the manager opens it once the initial
    /// handle is stored.
    pub fn new(client_id: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            client_id: client_id.into(),
            gate: AtomicBool::new(false),
            sender,
        }
    }

    /// Pure mapping from a raw transport event to a lifecycle status.
    pub fn translate(state: RawConnectionState, reason: DisconnectReason) -> ConnectionStatus {
        match (state, reason) {
            (RawConnectionState::Connected, _) => ConnectionStatus::ConnectionEstablished,
            (RawConnectionState::Disconnected, DisconnectReason::ExpiredSasToken) => {
                ConnectionStatus::DisconnectedTokenExpired
            }
            (RawConnectionState::Disconnected, _) => ConnectionStatus::Disconnected,
        }
    }

    /// Entry point for transport callbacks. Dropped while the gate is
    /// closed: the event may reference a handle that is being replaced.
    pub fn report(&self, state: RawConnectionState, reason: DisconnectReason) {
        if !self.gate.load(Ordering::Acquire) {
            debug!(
                client_id = %self.client_id,
                ?state,
                ?reason,
                "dropping transport event while update is in flight"
            );
            return;
        }
        self.emit(Self::translate(state, reason));
    }

    /// Direct emission, not subject to the gate. Used for statuses the
    /// manager itself raises, such as [`ConnectionStatus::TokenNearExpiry`].
    pub fn emit(&self, status: ConnectionStatus) {
        debug!(client_id = %self.client_id, ?status, "emitting connection status");
        let _ = self.sender.send(StatusEvent {
            client_id: self.client_id.clone(),
            status,
        });
    }

    pub fn open_gate(&self) {
        self.gate.store(true, Ordering::Release);
    }

    pub fn close_gate(&self) {
        self.gate.store(false, Ordering::Release);
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}
