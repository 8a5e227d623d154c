//! World table records.

use std::fmt;

use mudlink_integrity::CharacterHash;
use mudlink_protocol::{Character, CharacterId, PeerId};
use serde::{Deserialize, Serialize};

/// Identifies a live connection within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies an in-world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingId(pub u64);

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A player currently connected to the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConnection {
    pub id: ConnectionId,
    /// The remote peer, or `None` for the world's local owner.
    pub peer: Option<PeerId>,
    pub character_id: CharacterId,
    pub thing_id: ThingId,
    pub display_name: String,
    /// Unix milliseconds.
    pub connected_at: u64,
}

/// Input for [`WorldStore::add_connection`](crate::WorldStore::add_connection).
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub peer: Option<PeerId>,
    pub character_id: CharacterId,
    pub thing_id: ThingId,
    pub display_name: String,
}

/// A character snapshot as last seen in this world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldCharacter {
    pub character_id: CharacterId,
    pub character: Character,
    pub character_hash: CharacterHash,
    /// Set once, when the character is first added.
    pub added_at: u64,
    /// Strictly increases with every update.
    pub updated_at: u64,
}

/// An entity in the world: an avatar, an item, a room.
///
/// Avatars point at their character by id only; the snapshot itself
/// lives in the character table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    pub id: ThingId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ThingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<CharacterId>,
}

/// Input for [`WorldStore::enter_world`](crate::WorldStore::enter_world).
#[derive(Debug, Clone)]
pub struct EnterWorld {
    pub character: Character,
    /// Name of the avatar thing created for the character.
    pub thing_name: String,
    pub location: Option<ThingId>,
    pub peer: Option<PeerId>,
    pub display_name: String,
}
