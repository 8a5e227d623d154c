//! Roster records.
//!
//! Field names are camelCase on disk and on the wire so the same
//! documents can be read by browser peers.

use mudlink_integrity::CharacterHash;
use mudlink_protocol::{Character, PeerId, WorldId};
use serde::{Deserialize, Serialize};

/// Last known reachability of a friend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Away,
    Offline,
}

/// A trusted peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub peer_id: PeerId,
    pub player_name: String,
    #[serde(default)]
    pub notes: String,
    /// The friend request hasn't been accepted yet.
    #[serde(default)]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
    /// Worlds shared with this friend, either hosted by them or by us.
    pub worlds: Vec<FriendWorld>,
}

impl Friend {
    pub fn new(peer_id: impl Into<PeerId>, player_name: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            player_name: player_name.into(),
            notes: String::new(),
            pending: false,
            presence: None,
            worlds: Vec::new(),
        }
    }
}

/// A friend on the ban list, with the record as it was when banned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedPeer {
    pub friend: Friend,
    /// Unix milliseconds.
    pub banned_at: u64,
}

/// A world shared with a friend.
///
/// `host_peer_id` is the friend's own id when they host it, or the local
/// peer id when we host it and the friend plays in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendWorld {
    pub world_id: WorldId,
    pub world_name: String,
    pub host_peer_id: PeerId,
    pub characters: Vec<FriendCharacter>,
}

impl FriendWorld {
    pub fn new(
        world_id: impl Into<WorldId>,
        world_name: impl Into<String>,
        host_peer_id: impl Into<PeerId>,
    ) -> Self {
        Self {
            world_id: world_id.into(),
            world_name: world_name.into(),
            host_peer_id: host_peer_id.into(),
            characters: Vec::new(),
        }
    }
}

/// A friend's character in a shared world, with its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendCharacter {
    pub character: Character,
    pub character_hash: CharacterHash,
}
