//! Seams to the networking/SDK layer. The crate never opens sockets
//! itself; it drives a [`TransportOpener`] supplied at construction and
//! holds whatever [`CloudProxy`] handles the opener produces.

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::error::CloudLinkError;
use crate::models::{Identity, TransportConfig};
use crate::refresh::SasTokenSource;
use crate::status::StatusTranslator;

/// A live, authenticated connection handle.
pub trait CloudProxy: Send + Sync {
    fn is_active(&self) -> bool;

    fn close(&self) -> BoxFuture<'_, Result<(), CloudLinkError>>;
}

/// Everything a transport implementation needs to open one connection.
///
/// The opened client is expected to call [`SasTokenSource::get`] whenever
/// it needs to (re)authenticate, and to feed its raw connection events into
/// [`StatusTranslator::report`].
pub struct OpenRequest {
    pub identity: Identity,
    pub config: TransportConfig,
    pub token_source: Arc<SasTokenSource>,
    pub events: Arc<StatusTranslator>,
}

/// Opens one concrete transport. Supplied by the networking/SDK layer.
pub trait TransportOpener: Send + Sync {
    fn open(&self, request: OpenRequest)
        -> BoxFuture<'_, Result<Arc<dyn CloudProxy>, CloudLinkError>>;
}
