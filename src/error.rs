use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudLinkError {
    #[error("all configured transports failed")]
    TransportOpenFailed(#[source] Box<CloudLinkError>),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport open timed out after {0:?}")]
    OpenTimedOut(Duration),

    #[error("no transport configurations provided")]
    NoTransportsConfigured,

    #[error("replacement token for client {id} is already expired")]
    TokenAlreadyExpired { id: String },

    #[error("token could not be parsed for host {host}")]
    MalformedToken { host: String },

    #[error("pending token request was aborted")]
    TokenRequestAborted, // Manager shut down while a transport was waiting

    #[error("connection handle became inactive mid-operation")]
    ConnectionClosedMidOperation,

    #[error("credentials for client {got} do not match connection identity {expected}")]
    IdentityMismatch { expected: String, got: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudLinkError {
    /// True if this error means the token itself is the problem, rather
    /// than the network or the transport.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            CloudLinkError::TokenAlreadyExpired { .. } | CloudLinkError::MalformedToken { .. }
        )
    }
}
