//! Error types for the session layer.

use mudlink_protocol::ProtocolError;
use mudlink_transport::TransportError;

use crate::Role;

/// Errors returned by [`SessionAdapter`](crate::SessionAdapter).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested path exists in the interface but has no
    /// implementation (relay hosting).
    #[error("{0} is not supported")]
    NotSupported(&'static str),

    /// `start()` hasn't been called yet.
    #[error("session adapter not started")]
    NotStarted,

    /// The action isn't allowed from the current role. Call `reset()`
    /// first to get back to solo play.
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: Role, action: &'static str },

    /// Sending to a peer failed. An unknown host on `join_session`
    /// surfaces here as [`TransportError::PeerUnreachable`].
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
