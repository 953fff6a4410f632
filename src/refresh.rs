//! Asynchronous SAS-token renewal hand-off.
//!
//! The transport layer asks for a token mid-authentication
//! ([`SasTokenSource::get`]); an external updater delivers one later
//! ([`TokenRefreshCoordinator::supply_token`]). Between the two sits a
//! single pending-request slot: at most one outstanding request exists at
//! a time, and every concurrent asker awaits the same resolution.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::CloudLinkError;
use crate::models::{Identity, TokenCredentials};
use crate::sas;
use crate::settings::ConnectionSettings;
use crate::status::{ConnectionStatus, StatusTranslator};

pub struct TokenRefreshCoordinator {
    identity: Identity,
    translator: Arc<StatusTranslator>,
    // The pending-request slot. Waiters hold broadcast receivers; the one
    // message ever sent on a given channel is the delivered token.
    pending: Mutex<Option<broadcast::Sender<String>>>,
    token_expiry_buffer: Duration,
    token_retry_wait: Duration,
}

impl TokenRefreshCoordinator {
    pub fn new(
        identity: Identity,
        translator: Arc<StatusTranslator>,
        settings: &ConnectionSettings,
    ) -> Self {
        Self {
            identity,
            translator,
            pending: Mutex::new(None),
            token_expiry_buffer: settings.token_expiry_buffer,
            token_retry_wait: settings.token_retry_wait,
        }
    }

    /// Obtain a usable token, suspending until one is supplied if the
    /// current one is too close to expiry.
    ///
    /// Keeps retrying: a delivered token that is itself already stale is
    /// rejected and a new wait begins, so a racing update for an older
    /// token generation cannot satisfy this request. Repeated waits are
    /// spaced out by the configured retry wait before the near-expiry
    /// notification is raised again.
    pub async fn request_token(&self, current: String) -> Result<String, CloudLinkError> {
        debug!(client_id = %self.identity, "token requested by transport");
        let host = self.identity.hub_host_name();
        let mut retrying = false;
        let mut token = current;
        loop {
            if sas::is_usable(host, &token, self.token_expiry_buffer) {
                if retrying {
                    info!(client_id = %self.identity, "obtained new token");
                } else {
                    info!(
                        client_id = %self.identity,
                        "token requested, but existing token is usable"
                    );
                }
                return Ok(token);
            }
            debug!(client_id = %self.identity, "current token is not usable, waiting for a fresh one");

            let (mut receiver, created) = {
                let mut slot = self.pending.lock().unwrap();
                match slot.as_ref() {
                    Some(sender) => (sender.subscribe(), false),
                    None => {
                        let (sender, receiver) = broadcast::channel(1);
                        *slot = Some(sender);
                        (receiver, true)
                    }
                }
            };

            // Only the caller that created the pending request announces
            // it, so near-expiry is raised exactly once per transition.
            if created {
                if retrying {
                    sleep(jittered(self.token_retry_wait)).await;
                }
                self.translator.emit(ConnectionStatus::TokenNearExpiry);
            }

            retrying = true;
            token = match receiver.recv().await {
                Ok(token) => token,
                Err(broadcast::error::RecvError::Closed) => {
                    warn!(client_id = %self.identity, "pending token request aborted");
                    return Err(CloudLinkError::TokenRequestAborted);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            };
        }
    }

    /// Resolve the pending request with freshly minted credentials.
    ///
    /// Returns `true` if a request was pending and has been resolved (the
    /// in-flight transport call completes authentication with the supplied
    /// token; no new connection is needed), `false` if nothing was waiting
    /// and the caller should rebuild the connection instead. A replacement
    /// token that is itself already expired fails the update and leaves
    /// the pending request untouched.
    pub fn supply_token(&self, credentials: &TokenCredentials) -> Result<bool, CloudLinkError> {
        let mut slot = self.pending.lock().unwrap();
        if slot.is_none() {
            return Ok(false);
        }
        if sas::is_expired(self.identity.hub_host_name(), credentials.token()) {
            return Err(CloudLinkError::TokenAlreadyExpired {
                id: self.identity.id().to_string(),
            });
        }
        // Clear the slot before resolving, so a waiter that finds the
        // delivered token stale creates a fresh request.
        let sender = slot.take().expect("pending request checked above");
        let delivered = sender.send(credentials.token().to_string()).unwrap_or(0);
        debug!(
            client_id = %self.identity,
            waiters = delivered,
            "resolved pending token request"
        );
        Ok(true)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }

    /// Number of callers currently awaiting a token. Diagnostics only.
    pub fn pending_waiters(&self) -> usize {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the pending request, if any, failing its waiters out with
    /// [`CloudLinkError::TokenRequestAborted`]. Used during shutdown.
    pub fn abort_pending(&self) {
        if self.pending.lock().unwrap().take().is_some() {
            debug!(client_id = %self.identity, "aborted pending token request");
        }
    }
}

/// Token source handed to one opened transport client.
///
/// One instance exists per connection handle; all instances share the
/// manager's [`TokenRefreshCoordinator`]. Concurrent authentication
/// callbacks from the transport are serialized on a lock of their own, so
/// they never contend with (or wait on) the manager's update lock.
pub struct SasTokenSource {
    refresh: Arc<TokenRefreshCoordinator>,
    auth_lock: tokio::sync::Mutex<()>,
    current: RwLock<String>,
}

impl SasTokenSource {
    pub fn new(initial_token: impl Into<String>, refresh: Arc<TokenRefreshCoordinator>) -> Self {
        Self {
            refresh,
            auth_lock: tokio::sync::Mutex::new(()),
            current: RwLock::new(initial_token.into()),
        }
    }

    /// Called by the transport layer whenever it needs a token. Suspends
    /// until a usable token is available.
    pub async fn get(&self) -> Result<String, CloudLinkError> {
        let _guard = self.auth_lock.lock().await;
        let current = self.current.read().unwrap().clone();
        match self.refresh.request_token(current).await {
            Ok(fresh) => {
                *self.current.write().unwrap() = fresh.clone();
                Ok(fresh)
            }
            Err(e) => {
                warn!(error = %e, "error renewing token");
                Err(e)
            }
        }
    }

    /// Last token this source handed out (or was seeded with).
    pub fn current_token(&self) -> String {
        self.current.read().unwrap().clone()
    }
}

/// Spread repeated retry waits out by up to ±30% so many managers under
/// sustained auth failure do not hammer the endpoint in lockstep.
fn jittered(base: Duration) -> Duration {
    let jitter_factor = rand::random::<f32>() * 0.6 - 0.3; // -0.3 to +0.3
    let jitter = base.mul_f32(jitter_factor.abs());
    if jitter_factor >= 0.0 {
        base + jitter
    } else {
        base - jitter
    }
}
