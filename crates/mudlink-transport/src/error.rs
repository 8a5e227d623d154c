use crate::PeerId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target peer is not connected (or was never known).
    #[error("peer {0} is unreachable")]
    PeerUnreachable(PeerId),

    /// `initialize()` has not been called yet, so there is no local
    /// identity to send from.
    #[error("transport not initialized")]
    NotInitialized,

    /// Another endpoint already registered this peer id on the network.
    #[error("peer id {0} is already registered")]
    AlreadyRegistered(PeerId),

    /// The transport was destroyed.
    #[error("transport shut down")]
    Shutdown,
}
