//! Unified error type for mudlink.

use mudlink_friends::FriendsError;
use mudlink_integrity::IntegrityError;
use mudlink_protocol::ProtocolError;
use mudlink_session::SessionError;
use mudlink_storage::StorageError;
use mudlink_transport::TransportError;
use mudlink_world::WorldError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `mudlink` crate directly, this is the only error type
/// to match on; `?` converts the sub-crate errors through `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum MudlinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Role transitions, unreachable hosts, unsupported relay paths.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Roster conflicts and lookups.
    #[error(transparent)]
    Friends(#[from] FriendsError),

    #[error(transparent)]
    World(#[from] WorldError),
}
