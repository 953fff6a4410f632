//! Cloud connection lifecycle management for IoT edge identities.
//!
//! A [`CloudConnectionManager`] owns one logical connection from a
//! device/module identity to a cloud messaging endpoint. It opens the
//! connection by trying an ordered list of transports with fallback, keeps
//! it authenticated by brokering asynchronous SAS-token renewal between
//! the transport layer and an external credential updater, serializes
//! concurrent token updates so only one handle swap happens at a time, and
//! reports lifecycle status changes on a broadcast channel.
//!
//! # Logging
//!
//! This library uses the `tracing` crate for logging. To see logs,
//! initialize a tracing subscriber in your application, e.g. with
//! `tracing_subscriber::fmt()`.

mod error;
pub use error::CloudLinkError;
mod models;
pub use models::{Identity, ProxySettings, TokenCredentials, TransportConfig, TransportKind};
pub mod sas;
mod status;
pub use status::{
    ConnectionStatus, DisconnectReason, RawConnectionState, StatusEvent, StatusTranslator,
};
mod refresh;
pub use refresh::{SasTokenSource, TokenRefreshCoordinator};
pub mod fallback;
mod transport;
pub use transport::{CloudProxy, OpenRequest, TransportOpener};
mod settings;
pub use settings::{ConnectionSettings, SETTINGS};

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The currently active handle together with the token source that was
/// created for it. Replaced wholesale on every swap, never mutated.
#[derive(Clone)]
struct ActiveConnection {
    proxy: Arc<dyn CloudProxy>,
    token_source: Arc<SasTokenSource>,
}

/// Creates and manages one authenticated cloud connection.
pub struct CloudConnectionManager {
    identity: Identity,
    transports: Vec<TransportConfig>,
    opener: Arc<dyn TransportOpener>,
    translator: Arc<StatusTranslator>,
    refresh: Arc<TokenRefreshCoordinator>,
    active: RwLock<Option<ActiveConnection>>,
    // Serializes external token updates: one swap at a time. Transport
    // callbacks must never wait on this lock.
    update_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl CloudConnectionManager {
    /// Open the initial connection and return a manager holding it.
    ///
    /// The identity is taken from the credentials and is fixed for the
    /// manager's lifetime. Transports are attempted in the given order;
    /// if every one fails the last transport error is returned wrapped in
    /// [`CloudLinkError::TransportOpenFailed`].
    pub async fn create(
        credentials: TokenCredentials,
        transports: Vec<TransportConfig>,
        opener: Arc<dyn TransportOpener>,
        settings: Option<ConnectionSettings>,
        cancel: CancellationToken,
    ) -> Result<Self, CloudLinkError> {
        let identity = credentials.identity().clone();
        let settings = settings.unwrap_or_else(|| SETTINGS.clone());
        info!(client_id = %identity, "creating cloud connection");

        let translator = Arc::new(StatusTranslator::new(
            identity.id(),
            settings.status_buffer_capacity,
        ));
        let refresh = Arc::new(TokenRefreshCoordinator::new(
            identity.clone(),
            translator.clone(),
            &settings,
        ));
        let manager = Self {
            identity,
            transports,
            opener,
            translator,
            refresh: refresh.clone(),
            active: RwLock::new(None),
            update_lock: tokio::sync::Mutex::new(()),
            // Child token: dropping the manager aborts its own in-flight
            // work without cancelling the caller's ambient token.
            cancel: cancel.child_token(),
        };

        let token_source = Arc::new(SasTokenSource::new(credentials.token(), refresh));
        let proxy = manager.open_proxy(token_source.clone()).await?;
        *manager.active.write().unwrap() = Some(ActiveConnection {
            proxy,
            token_source,
        });
        manager.translator.open_gate();
        info!(client_id = %manager.identity, "cloud connection created");
        Ok(manager)
    }

    /// Subscribe to lifecycle status notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.translator.subscribe()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The stored handle, filtered by liveness. `None` means "not
    /// currently connected", not an error.
    pub fn current_proxy(&self) -> Option<Arc<dyn CloudProxy>> {
        self.active
            .read()
            .unwrap()
            .as_ref()
            .map(|conn| conn.proxy.clone())
            .filter(|proxy| proxy.is_active())
    }

    pub fn is_active(&self) -> bool {
        self.current_proxy().is_some()
    }

    /// Remaining validity of the token the active connection last used.
    /// Diagnostics accessor.
    pub fn remaining_token_life(&self) -> Result<Duration, CloudLinkError> {
        let token = self
            .active
            .read()
            .unwrap()
            .as_ref()
            .map(|conn| conn.token_source.current_token())
            .ok_or(CloudLinkError::ConnectionClosedMidOperation)?;
        sas::remaining(self.identity.hub_host_name(), &token)
    }

    /// Close the stored handle, if any. Idempotent; returns whether a
    /// handle existed. Any transport call still waiting on a token is
    /// failed out.
    pub async fn close(&self) -> bool {
        let taken = self.active.write().unwrap().take();
        self.refresh.abort_pending();
        match taken {
            Some(conn) => {
                if let Err(e) = conn.proxy.close().await {
                    warn!(client_id = %self.identity, error = %e, "error closing cloud connection");
                }
                info!(client_id = %self.identity, "cloud connection closed");
                true
            }
            None => false,
        }
    }

    /// Apply freshly minted credentials, swapping the connection handle if
    /// necessary.
    ///
    /// Exactly one update runs at a time; a second concurrent caller
    /// blocks until the first completes and then observes the already
    /// updated state. Which path is taken:
    ///
    /// 1. A transport call is waiting for a token: hand the token over and
    ///    keep the existing handle.
    /// 2. The active handle already carries this token: nothing to do.
    /// 3. Otherwise: open a brand-new handle, store it, and only then
    ///    close the previous one, so there is never a connectionless gap.
    ///
    /// On any error the previous handle remains authoritative.
    pub async fn update_token(
        &self,
        credentials: TokenCredentials,
    ) -> Result<Arc<dyn CloudProxy>, CloudLinkError> {
        if credentials.identity().id() != self.identity.id() {
            return Err(CloudLinkError::IdentityMismatch {
                expected: self.identity.id().to_string(),
                got: credentials.identity().id().to_string(),
            });
        }

        let _guard = self.update_lock.lock().await;
        // Transport events raised during the swap may reference the handle
        // being replaced; drop them until the swap is complete.
        self.translator.close_gate();
        let result = self.apply_credentials(&credentials).await;
        self.translator.open_gate();

        match &result {
            Ok(_) => debug!(client_id = %self.identity, "updated cloud connection"),
            Err(e) => {
                error!(client_id = %self.identity, error = %e, "error updating cloud connection")
            }
        }
        result
    }

    async fn apply_credentials(
        &self,
        credentials: &TokenCredentials,
    ) -> Result<Arc<dyn CloudProxy>, CloudLinkError> {
        let existing = self.active.read().unwrap().clone();
        let Some(conn) = existing else {
            // No handle at all (closed earlier, or never opened): just
            // build a fresh one.
            return self.rebuild(credentials, None).await;
        };

        if self.refresh.supply_token(credentials)? {
            return Ok(conn.proxy);
        }

        if conn.token_source.current_token() == credentials.token() && conn.proxy.is_active() {
            debug!(client_id = %self.identity, "credentials already applied, skipping rebuild");
            return Ok(conn.proxy);
        }

        self.rebuild(credentials, Some(conn)).await
    }

    async fn rebuild(
        &self,
        credentials: &TokenCredentials,
        previous: Option<ActiveConnection>,
    ) -> Result<Arc<dyn CloudProxy>, CloudLinkError> {
        let token_source = Arc::new(SasTokenSource::new(
            credentials.token(),
            self.refresh.clone(),
        ));
        let proxy = self.open_proxy(token_source.clone()).await?;
        *self.active.write().unwrap() = Some(ActiveConnection {
            proxy: proxy.clone(),
            token_source,
        });
        // The old handle goes away only after the new one is stored.
        if let Some(previous) = previous {
            if let Err(e) = previous.proxy.close().await {
                warn!(client_id = %self.identity, error = %e, "error closing replaced connection");
            }
        }
        Ok(proxy)
    }

    async fn open_proxy(
        &self,
        token_source: Arc<SasTokenSource>,
    ) -> Result<Arc<dyn CloudProxy>, CloudLinkError> {
        fallback::connect(&self.transports, &self.cancel, |config| {
            let request = OpenRequest {
                identity: self.identity.clone(),
                config: config.clone(),
                token_source: token_source.clone(),
                events: self.translator.clone(),
            };
            let opener = self.opener.clone();
            async move { opener.open(request).await }
        })
        .await
    }
}

impl std::fmt::Debug for CloudConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConnectionManager")
            .field("identity", &self.identity)
            .field("transports", &self.transports)
            .field("is_active", &self.is_active())
            .finish()
    }
}

// Abort any in-flight fallback attempt when the manager goes away.
impl Drop for CloudConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.refresh.abort_pending();
    }
}
