//! Ordered transport fallback.

use std::future::Future;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CloudLinkError;
use crate::models::TransportConfig;

/// Try each config strictly in sequence, returning the first successfully
/// opened handle.
///
/// Attempts are never raced in parallel: opening a connection performs a
/// handshake, and the ordering encodes an intentional preference. Each
/// attempt is bounded by its config's `operation_timeout`. Per-attempt
/// failures are logged; only the **last** failure is surfaced, wrapped in
/// [`CloudLinkError::TransportOpenFailed`]. Cancelling stops the sequence
/// and abandons the in-flight attempt without retry.
pub async fn connect<T, F, Fut>(
    configs: &[TransportConfig],
    cancel: &CancellationToken,
    mut open: F,
) -> Result<T, CloudLinkError>
where
    F: FnMut(&TransportConfig) -> Fut,
    Fut: Future<Output = Result<T, CloudLinkError>>,
{
    if configs.is_empty() {
        return Err(CloudLinkError::NoTransportsConfigured);
    }

    let mut last_error = None;
    for config in configs {
        if cancel.is_cancelled() {
            return Err(CloudLinkError::Cancelled);
        }

        info!(transport = %config.kind, "attempting connection");
        let attempt = timeout(config.operation_timeout, open(config));
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CloudLinkError::Cancelled),
            result = attempt => match result {
                Ok(inner) => inner,
                Err(_) => Err(CloudLinkError::OpenTimedOut(config.operation_timeout)),
            },
        };

        match result {
            Ok(handle) => {
                info!(transport = %config.kind, "connected");
                return Ok(handle);
            }
            Err(e) => {
                warn!(transport = %config.kind, error = %e, "transport attempt failed, falling back");
                last_error = Some(e);
            }
        }
    }

    let last = last_error.expect("at least one attempt was made");
    Err(CloudLinkError::TransportOpenFailed(Box::new(last)))
}
