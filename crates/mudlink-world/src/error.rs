//! Error types for the world store.

use std::fmt;

use mudlink_integrity::IntegrityError;
use mudlink_protocol::CharacterId;
use mudlink_storage::StorageError;

use crate::ThingId;

/// Names the world record an operation tripped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldRecord {
    Character(CharacterId),
    Thing(ThingId),
}

impl fmt::Display for WorldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character(id) => write!(f, "character {id}"),
            Self::Thing(id) => write!(f, "thing {id}"),
        }
    }
}

/// Errors that can occur during world store operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("{0} not found")]
    NotFound(WorldRecord),

    #[error("{0} already exists")]
    AlreadyExists(WorldRecord),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Loading or committing failed. A failed commit leaves the store
    /// exactly as it was before the operation.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
