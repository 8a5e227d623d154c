//! Error types for the friends roster.

use std::fmt;

use mudlink_integrity::IntegrityError;
use mudlink_protocol::{CharacterId, PeerId, WorldId};
use mudlink_storage::StorageError;

/// Names the roster record an operation tripped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEntry {
    Friend(PeerId),
    World {
        peer: PeerId,
        world: WorldId,
    },
    Character {
        peer: PeerId,
        world: WorldId,
        character: CharacterId,
    },
}

impl fmt::Display for RosterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Friend(peer) => write!(f, "friend {peer}"),
            Self::World { peer, world } => {
                write!(f, "world {world} of friend {peer}")
            }
            Self::Character {
                peer,
                world,
                character,
            } => write!(
                f,
                "character {character} in world {world} of friend {peer}"
            ),
        }
    }
}

/// Errors that can occur during roster operations.
#[derive(Debug, thiserror::Error)]
pub enum FriendsError {
    /// The friend, world, or character doesn't exist.
    #[error("{0} not found")]
    NotFound(RosterEntry),

    /// An `add_*` call collided with an existing record. Use the
    /// matching `update_*` call instead.
    #[error("{0} already exists")]
    AlreadyExists(RosterEntry),

    /// The peer is on the ban list and must be unbanned first.
    #[error("peer {0} is banned")]
    Banned(PeerId),

    /// A character couldn't be hashed.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Persisting the roster failed. The in-memory change stands.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
