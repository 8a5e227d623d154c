//! The roster manager: owns friends, banned peers, and their worlds.
//!
//! One `FriendsRoster` exists per client. Every mutation goes through
//! `&mut self`, updates memory first and then persists, so writes are
//! naturally serialized. Reads hand out clones; nothing outside this
//! module can reach into the maps.
//!
//! # Failure policy
//!
//! - `add_*` fails on conflict (`AlreadyExists`) and on unknown parents
//!   (`NotFound`).
//! - `update_*` and `remove_*` on missing targets log and return `Ok`.
//!   They are called speculatively from refresh cycles that may hold
//!   stale state.
//!
//! # Unreadable documents
//!
//! A document that can't be decoded at load is copied aside under
//! `<key>.unreadable` and the roster starts with that collection empty.
//! If the copy can't be made, or the document couldn't be read at all,
//! the roster refuses to write that key for the rest of its life.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use mudlink_integrity as integrity;
use mudlink_protocol::{Character, CharacterId, PeerId, WorldId};
use mudlink_storage::{Storage, StorageError, VersionedDoc, WriteBatch};

use crate::migrate::{self, CURRENT_VERSION, Decoded};
use crate::{
    BannedPeer, Friend, FriendCharacter, FriendWorld, FriendsError,
    Presence, RosterConfig, RosterEntry,
};

/// Friends and banned peers, persisted as two documents.
pub struct FriendsRoster<S: Storage> {
    storage: S,
    config: RosterConfig,
    friends: BTreeMap<PeerId, Friend>,
    banned: BTreeMap<PeerId, BannedPeer>,
    /// Our own peer id, known once the transport is up.
    local_peer_id: Option<PeerId>,
    friends_writable: bool,
    banned_writable: bool,
}

/// Which document a two-document write lands first.
#[derive(Clone, Copy)]
enum First {
    Friends,
    Banned,
}

impl<S: Storage> FriendsRoster<S> {
    /// Loads both documents from `storage`.
    ///
    /// The two documents load independently: if one is unreadable it is
    /// logged and treated as empty, and the other still loads. Legacy
    /// documents are migrated and written back in the current format.
    /// An unreadable document is never overwritten in place.
    pub async fn load(storage: S, config: RosterConfig) -> Self {
        let friends = read_doc(&storage, &config.friends_key, migrate::decode_friends).await;
        let banned = read_doc(&storage, &config.banned_key, migrate::decode_banned).await;

        let mut roster = Self {
            storage,
            config,
            friends: BTreeMap::new(),
            banned: BTreeMap::new(),
            local_peer_id: None,
            friends_writable: friends.writable,
            banned_writable: banned.writable,
        };

        let (friends, banned) = (friends.decoded, banned.decoded);
        for entry in banned.entries {
            roster.banned.insert(entry.friend.peer_id.clone(), entry);
        }
        for friend in friends.entries {
            if roster.banned.contains_key(&friend.peer_id) {
                tracing::warn!(
                    peer = %friend.peer_id,
                    "peer is both friend and banned on disk; keeping ban"
                );
                continue;
            }
            roster.friends.insert(friend.peer_id.clone(), friend);
        }

        if friends.migrated {
            if let Err(e) = roster.persist_friends().await {
                tracing::warn!(error = %e, "failed to write migrated friends document");
            }
        }
        if banned.migrated {
            if let Err(e) = roster.persist_banned().await {
                tracing::warn!(error = %e, "failed to write migrated banned document");
            }
        }

        tracing::info!(
            friends = roster.friends.len(),
            banned = roster.banned.len(),
            "roster loaded"
        );
        roster
    }

    /// Records the local peer id, used to tell which shared worlds we host.
    pub fn set_local_peer_id(&mut self, id: PeerId) {
        self.local_peer_id = Some(id);
    }

    pub fn local_peer_id(&self) -> Option<&PeerId> {
        self.local_peer_id.as_ref()
    }

    // =====================================================================
    // Friends and bans
    // =====================================================================

    /// Adds a new friend.
    ///
    /// # Errors
    /// - [`FriendsError::AlreadyExists`] if the peer is already a friend.
    /// - [`FriendsError::Banned`] if the peer is banned.
    pub async fn add_friend(&mut self, friend: Friend) -> Result<(), FriendsError> {
        let peer = friend.peer_id.clone();
        if self.friends.contains_key(&peer) {
            return Err(FriendsError::AlreadyExists(RosterEntry::Friend(peer)));
        }
        if self.banned.contains_key(&peer) {
            return Err(FriendsError::Banned(peer));
        }

        self.friends.insert(peer.clone(), friend);
        tracing::info!(%peer, "friend added");
        self.persist_friends().await
    }

    /// Replaces an existing friend record. Unknown peers are ignored.
    pub async fn update_friend(&mut self, friend: Friend) -> Result<(), FriendsError> {
        match self.friends.get_mut(&friend.peer_id) {
            Some(existing) => *existing = friend,
            None => {
                tracing::warn!(peer = %friend.peer_id, "update of unknown friend ignored");
                return Ok(());
            }
        }
        self.persist_friends().await
    }

    /// Updates a friend's presence. Unknown peers are ignored.
    pub async fn set_presence(
        &mut self,
        peer: &PeerId,
        presence: Presence,
    ) -> Result<(), FriendsError> {
        match self.friends.get_mut(peer) {
            Some(friend) if friend.presence == Some(presence) => return Ok(()),
            Some(friend) => friend.presence = Some(presence),
            None => {
                tracing::debug!(%peer, "presence for non-friend ignored");
                return Ok(());
            }
        }
        self.persist_friends().await
    }

    /// Removes a friend. Removing an unknown peer is a no-op.
    pub async fn remove_friend(&mut self, peer: &PeerId) -> Result<(), FriendsError> {
        if self.friends.remove(peer).is_none() {
            return Ok(());
        }
        tracing::info!(%peer, "friend removed");
        self.persist_friends().await
    }

    /// Moves `peer` onto the ban list, keeping `snapshot` for a later
    /// unban. Both documents are written in one batch.
    pub async fn ban_peer(
        &mut self,
        peer: &PeerId,
        mut snapshot: Friend,
    ) -> Result<(), FriendsError> {
        snapshot.peer_id = peer.clone();
        self.friends.remove(peer);
        self.banned.insert(
            peer.clone(),
            BannedPeer {
                friend: snapshot,
                banned_at: now_millis(),
            },
        );
        tracing::info!(%peer, "peer banned");
        self.persist_both(First::Banned).await
    }

    /// Lifts a ban, restoring the stored snapshot as an active friend.
    /// Unbanning a peer that isn't banned is a no-op.
    pub async fn unban_peer(&mut self, peer: &PeerId) -> Result<(), FriendsError> {
        let Some(entry) = self.banned.remove(peer) else {
            return Ok(());
        };
        self.friends.insert(peer.clone(), entry.friend);
        tracing::info!(%peer, "peer unbanned");
        self.persist_both(First::Friends).await
    }

    pub fn get_friend(&self, peer: &PeerId) -> Option<Friend> {
        self.friends.get(peer).cloned()
    }

    /// All friends, ordered by peer id.
    pub fn get_friends(&self) -> Vec<Friend> {
        self.friends.values().cloned().collect()
    }

    pub fn get_banned_peer(&self, peer: &PeerId) -> Option<BannedPeer> {
        self.banned.get(peer).cloned()
    }

    pub fn get_banned_peers(&self) -> Vec<BannedPeer> {
        self.banned.values().cloned().collect()
    }

    pub fn is_friend(&self, peer: &PeerId) -> bool {
        self.friends.contains_key(peer)
    }

    pub fn is_banned(&self, peer: &PeerId) -> bool {
        self.banned.contains_key(peer)
    }

    // =====================================================================
    // Worlds shared with a friend
    // =====================================================================

    /// Starts tracking a world shared with `peer`.
    ///
    /// # Errors
    /// `NotFound` for an unknown friend, `AlreadyExists` if the world is
    /// already tracked for them.
    pub async fn add_friend_world(
        &mut self,
        peer: &PeerId,
        world: FriendWorld,
    ) -> Result<(), FriendsError> {
        let friend = self.friend_mut(peer)?;
        if friend.worlds.iter().any(|w| w.world_id == world.world_id) {
            return Err(FriendsError::AlreadyExists(RosterEntry::World {
                peer: peer.clone(),
                world: world.world_id,
            }));
        }
        tracing::debug!(%peer, world = %world.world_id, "friend world added");
        friend.worlds.push(world);
        self.persist_friends().await
    }

    /// Stops tracking a world. No-op if the friend or world is unknown.
    pub async fn remove_friend_world(
        &mut self,
        peer: &PeerId,
        world_id: &WorldId,
    ) -> Result<(), FriendsError> {
        let Some(friend) = self.friends.get_mut(peer) else {
            return Ok(());
        };
        let before = friend.worlds.len();
        friend.worlds.retain(|w| w.world_id != *world_id);
        if friend.worlds.len() == before {
            return Ok(());
        }
        self.persist_friends().await
    }

    pub fn get_friend_world(
        &self,
        peer: &PeerId,
        world_id: &WorldId,
    ) -> Result<Option<FriendWorld>, FriendsError> {
        Ok(self
            .friend(peer)?
            .worlds
            .iter()
            .find(|w| w.world_id == *world_id)
            .cloned())
    }

    pub fn get_friend_worlds(&self, peer: &PeerId) -> Result<Vec<FriendWorld>, FriendsError> {
        Ok(self.friend(peer)?.worlds.clone())
    }

    /// Worlds the friend hosts themselves.
    pub fn get_friend_hosted_worlds(
        &self,
        peer: &PeerId,
    ) -> Result<Vec<FriendWorld>, FriendsError> {
        Ok(worlds_hosted_by(self.friend(peer)?, peer))
    }

    /// Worlds we host that the friend plays in.
    ///
    /// Before the local peer id is known this returns an empty list and
    /// logs a warning rather than failing.
    pub fn get_my_worlds_with_friend(
        &self,
        peer: &PeerId,
    ) -> Result<Vec<FriendWorld>, FriendsError> {
        let Some(local) = &self.local_peer_id else {
            tracing::warn!(%peer, "local peer id unknown; no hosted worlds to report");
            return Ok(Vec::new());
        };
        Ok(worlds_hosted_by(self.friend(peer)?, local))
    }

    // =====================================================================
    // Characters inside a shared world
    // =====================================================================

    /// Starts tracking a friend's character, hashing its content.
    ///
    /// # Errors
    /// `NotFound` if the friend or world is unknown, `AlreadyExists` if
    /// a character with the same id is already tracked in that world.
    pub async fn add_friend_character(
        &mut self,
        peer: &PeerId,
        world_id: &WorldId,
        character: Character,
    ) -> Result<(), FriendsError> {
        let character_hash = integrity::hash(&character)?;
        let world = self.world_mut(peer, world_id)?;
        if world.characters.iter().any(|c| c.character.id == character.id) {
            return Err(FriendsError::AlreadyExists(RosterEntry::Character {
                peer: peer.clone(),
                world: world_id.clone(),
                character: character.id,
            }));
        }
        world.characters.push(FriendCharacter {
            character,
            character_hash,
        });
        self.persist_friends().await
    }

    /// Replaces a tracked character and recomputes its hash.
    ///
    /// A missing friend, world, or character is logged and ignored.
    pub async fn update_friend_character(
        &mut self,
        peer: &PeerId,
        world_id: &WorldId,
        character: Character,
    ) -> Result<(), FriendsError> {
        let character_hash = integrity::hash(&character)?;
        let Ok(world) = self.world_mut(peer, world_id) else {
            tracing::warn!(
                %peer,
                world = %world_id,
                "character update for unknown world ignored"
            );
            return Ok(());
        };
        let Some(entry) = world
            .characters
            .iter_mut()
            .find(|c| c.character.id == character.id)
        else {
            tracing::warn!(
                %peer,
                world = %world_id,
                character = %character.id,
                "update of unknown character ignored"
            );
            return Ok(());
        };
        entry.character = character;
        entry.character_hash = character_hash;
        self.persist_friends().await
    }

    /// Stops tracking a character. No-op if anything along the path is
    /// missing.
    pub async fn remove_friend_character(
        &mut self,
        peer: &PeerId,
        world_id: &WorldId,
        character_id: &CharacterId,
    ) -> Result<(), FriendsError> {
        let Ok(world) = self.world_mut(peer, world_id) else {
            return Ok(());
        };
        let before = world.characters.len();
        world.characters.retain(|c| c.character.id != *character_id);
        if world.characters.len() == before {
            return Ok(());
        }
        self.persist_friends().await
    }

    /// Returns `true` if `character` matches the hash stored for it.
    ///
    /// Never fails: anything missing counts as a mismatch.
    pub fn verify_friend_character(
        &self,
        peer: &PeerId,
        world_id: &WorldId,
        character: &Character,
    ) -> bool {
        self.friends
            .get(peer)
            .and_then(|f| f.worlds.iter().find(|w| w.world_id == *world_id))
            .and_then(|w| w.characters.iter().find(|c| c.character.id == character.id))
            .is_some_and(|stored| integrity::verify(character, &stored.character_hash))
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn friend(&self, peer: &PeerId) -> Result<&Friend, FriendsError> {
        self.friends
            .get(peer)
            .ok_or_else(|| FriendsError::NotFound(RosterEntry::Friend(peer.clone())))
    }

    fn friend_mut(&mut self, peer: &PeerId) -> Result<&mut Friend, FriendsError> {
        self.friends
            .get_mut(peer)
            .ok_or_else(|| FriendsError::NotFound(RosterEntry::Friend(peer.clone())))
    }

    fn world_mut(
        &mut self,
        peer: &PeerId,
        world_id: &WorldId,
    ) -> Result<&mut FriendWorld, FriendsError> {
        self.friend_mut(peer)?
            .worlds
            .iter_mut()
            .find(|w| w.world_id == *world_id)
            .ok_or_else(|| {
                FriendsError::NotFound(RosterEntry::World {
                    peer: peer.clone(),
                    world: world_id.clone(),
                })
            })
    }

    fn friends_doc(&self) -> VersionedDoc<Vec<&Friend>> {
        VersionedDoc::new(CURRENT_VERSION, self.friends.values().collect())
    }

    fn banned_doc(&self) -> VersionedDoc<Vec<&BannedPeer>> {
        VersionedDoc::new(CURRENT_VERSION, self.banned.values().collect())
    }

    async fn persist_friends(&self) -> Result<(), FriendsError> {
        check_writable(&self.config.friends_key, self.friends_writable)?;
        self.storage
            .save(&self.config.friends_key, &self.friends_doc())
            .await?;
        Ok(())
    }

    async fn persist_banned(&self) -> Result<(), FriendsError> {
        check_writable(&self.config.banned_key, self.banned_writable)?;
        self.storage
            .save(&self.config.banned_key, &self.banned_doc())
            .await?;
        Ok(())
    }

    /// Writes both documents in one batch.
    ///
    /// `first` names the document that gains the peer. On a backend
    /// without atomic batches a partial write then leaves the peer in
    /// both documents, which `load` resolves to banned, and never in
    /// neither.
    async fn persist_both(&self, first: First) -> Result<(), FriendsError> {
        check_writable(&self.config.friends_key, self.friends_writable)?;
        check_writable(&self.config.banned_key, self.banned_writable)?;

        let mut batch = WriteBatch::new();
        match first {
            First::Friends => {
                batch.put_json(self.config.friends_key.as_str(), &self.friends_doc())?;
                batch.put_json(self.config.banned_key.as_str(), &self.banned_doc())?;
            }
            First::Banned => {
                batch.put_json(self.config.banned_key.as_str(), &self.banned_doc())?;
                batch.put_json(self.config.friends_key.as_str(), &self.friends_doc())?;
            }
        }
        self.storage.commit(batch).await?;
        Ok(())
    }
}

/// One roster document as loaded, and whether its key may be written.
struct LoadedDoc<T> {
    decoded: Decoded<T>,
    writable: bool,
}

/// Reads one roster document. Failures are logged and yield an empty
/// collection so the other document can still load.
async fn read_doc<S: Storage, T>(
    storage: &S,
    key: &str,
    decode: fn(&str, &[u8]) -> Result<Decoded<T>, StorageError>,
) -> LoadedDoc<T> {
    let empty = |writable| LoadedDoc {
        decoded: Decoded {
            entries: Vec::new(),
            migrated: false,
        },
        writable,
    };
    let raw = match storage.load_raw(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return empty(true),
        Err(e) => {
            tracing::error!(
                key,
                error = %e,
                "failed to read roster document; key is now read-only"
            );
            return empty(false);
        }
    };
    match decode(key, &raw) {
        Ok(decoded) => {
            if decoded.migrated {
                tracing::info!(key, "migrated legacy roster document");
            }
            LoadedDoc {
                decoded,
                writable: true,
            }
        }
        Err(e) => {
            let aside = unreadable_key(key);
            match storage.save_raw(&aside, raw).await {
                Ok(()) => {
                    tracing::error!(
                        key,
                        error = %e,
                        copy = %aside,
                        "roster document unreadable; starting empty"
                    );
                    empty(true)
                }
                Err(save_err) => {
                    tracing::error!(
                        key,
                        error = %e,
                        copy_error = %save_err,
                        "roster document unreadable and not copied aside; key is now read-only"
                    );
                    empty(false)
                }
            }
        }
    }
}

/// Where an unreadable roster document is copied before it can be
/// replaced.
pub fn unreadable_key(key: &str) -> String {
    format!("{key}.unreadable")
}

fn check_writable(key: &str, writable: bool) -> Result<(), FriendsError> {
    if writable {
        return Ok(());
    }
    Err(StorageError::CorruptDocument {
        key: key.to_string(),
        reason: "unreadable at load; refusing to overwrite".into(),
    }
    .into())
}

fn worlds_hosted_by(friend: &Friend, host: &PeerId) -> Vec<FriendWorld> {
    friend
        .worlds
        .iter()
        .filter(|w| w.host_peer_id == *host)
        .cloned()
        .collect()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
