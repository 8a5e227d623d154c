//! Staged edits to a world's tables.
//!
//! A [`WorldTx`] works on a private copy of the tables. The store swaps
//! that copy in only after the touched documents are committed, so an
//! error anywhere leaves the live tables untouched.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use mudlink_integrity as integrity;
use mudlink_protocol::{Character, CharacterId, PeerId};
use mudlink_storage::{StorageError, VersionedDoc, WriteBatch};

use crate::{
    ConnectionId, NewConnection, Thing, ThingId, WorldCharacter,
    WorldConnection, WorldError, WorldRecord,
};

/// Schema version of every world document.
pub(crate) const DOC_VERSION: u32 = 1;

/// Storage keys of one world's documents.
#[derive(Debug, Clone)]
pub(crate) struct DocKeys {
    pub connections: String,
    pub characters: String,
    pub things: String,
}

impl DocKeys {
    pub fn new(prefix: &str, world: &str) -> Self {
        Self {
            connections: format!("{prefix}/{world}/connections"),
            characters: format!("{prefix}/{world}/characters"),
            things: format!("{prefix}/{world}/things"),
        }
    }
}

/// The in-memory state of one world.
#[derive(Debug, Clone)]
pub(crate) struct WorldTables {
    pub connections: BTreeMap<ConnectionId, WorldConnection>,
    pub characters: BTreeMap<CharacterId, WorldCharacter>,
    pub things: BTreeMap<ThingId, Thing>,
    pub next_connection: u64,
    pub next_thing: u64,
}

impl WorldTables {
    pub fn from_records(
        connections: Vec<WorldConnection>,
        characters: Vec<WorldCharacter>,
        things: Vec<Thing>,
    ) -> Self {
        let next_connection = connections.iter().map(|c| c.id.0).max().unwrap_or(0) + 1;
        let next_thing = things.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        Self {
            connections: connections.into_iter().map(|c| (c.id, c)).collect(),
            characters: characters
                .into_iter()
                .map(|c| (c.character_id.clone(), c))
                .collect(),
            things: things.into_iter().map(|t| (t.id, t)).collect(),
            next_connection,
            next_thing,
        }
    }
}

/// Which documents a transaction touched.
#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    connections: bool,
    characters: bool,
    things: bool,
}

/// A set of staged changes, applied all-or-nothing by
/// [`WorldStore::transaction`](crate::WorldStore::transaction).
pub struct WorldTx {
    tables: WorldTables,
    dirty: Dirty,
}

impl WorldTx {
    pub(crate) fn new(tables: WorldTables) -> Self {
        Self {
            tables,
            dirty: Dirty::default(),
        }
    }

    // -- connections -------------------------------------------------------

    pub fn add_connection(&mut self, new: NewConnection) -> ConnectionId {
        let id = ConnectionId(self.tables.next_connection);
        self.tables.next_connection += 1;
        self.tables.connections.insert(
            id,
            WorldConnection {
                id,
                peer: new.peer,
                character_id: new.character_id,
                thing_id: new.thing_id,
                display_name: new.display_name,
                connected_at: now_millis(),
            },
        );
        self.dirty.connections = true;
        id
    }

    pub fn get_connection(&self, id: ConnectionId) -> Option<&WorldConnection> {
        self.tables.connections.get(&id)
    }

    /// Replaces a connection record. Unknown ids are logged and ignored.
    pub fn update_connection(&mut self, connection: WorldConnection) {
        match self.tables.connections.get_mut(&connection.id) {
            Some(existing) => {
                *existing = connection;
                self.dirty.connections = true;
            }
            None => {
                tracing::warn!(connection = %connection.id, "update of unknown connection ignored");
            }
        }
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<WorldConnection> {
        let removed = self.tables.connections.remove(&id);
        self.dirty.connections |= removed.is_some();
        removed
    }

    /// Drops every connection belonging to `peer`, returning how many.
    pub fn remove_peer_connections(&mut self, peer: &PeerId) -> usize {
        let before = self.tables.connections.len();
        self.tables
            .connections
            .retain(|_, c| c.peer.as_ref() != Some(peer));
        let removed = before - self.tables.connections.len();
        self.dirty.connections |= removed > 0;
        removed
    }

    /// Drops every connection, returning how many there were.
    pub fn clear_connections(&mut self) -> usize {
        let removed = self.tables.connections.len();
        self.tables.connections.clear();
        self.dirty.connections |= removed > 0;
        removed
    }

    // -- characters --------------------------------------------------------

    pub fn get_character(&self, id: &CharacterId) -> Option<&WorldCharacter> {
        self.tables.characters.get(id)
    }

    /// Stores a new character snapshot.
    ///
    /// # Errors
    /// `AlreadyExists` if the id is taken; use
    /// [`update_character`](Self::update_character) instead.
    pub fn add_character(&mut self, character: Character) -> Result<WorldCharacter, WorldError> {
        if self.tables.characters.contains_key(&character.id) {
            return Err(WorldError::AlreadyExists(WorldRecord::Character(
                character.id,
            )));
        }
        let now = now_millis();
        let record = WorldCharacter {
            character_id: character.id.clone(),
            character_hash: integrity::hash(&character)?,
            character,
            added_at: now,
            updated_at: now,
        };
        self.tables
            .characters
            .insert(record.character_id.clone(), record.clone());
        self.dirty.characters = true;
        Ok(record)
    }

    /// Replaces an existing snapshot, keeping `added_at` and advancing
    /// `updated_at`. Returns `None`, without inserting, if the character
    /// was never added.
    pub fn update_character(
        &mut self,
        character: Character,
    ) -> Result<Option<WorldCharacter>, WorldError> {
        let character_hash = integrity::hash(&character)?;
        let Some(record) = self.tables.characters.get_mut(&character.id) else {
            tracing::warn!(character = %character.id, "update of unknown character ignored");
            return Ok(None);
        };
        record.updated_at = now_millis().max(record.updated_at + 1);
        record.character = character;
        record.character_hash = character_hash;
        self.dirty.characters = true;
        Ok(Some(record.clone()))
    }

    pub fn remove_character(&mut self, id: &CharacterId) -> Option<WorldCharacter> {
        let removed = self.tables.characters.remove(id);
        self.dirty.characters |= removed.is_some();
        removed
    }

    // -- things ------------------------------------------------------------

    pub fn get_thing(&self, id: ThingId) -> Option<&Thing> {
        self.tables.things.get(&id)
    }

    /// Creates a thing, optionally inside another one.
    ///
    /// # Errors
    /// `NotFound` if `location` names a thing that doesn't exist.
    pub fn add_thing(
        &mut self,
        name: impl Into<String>,
        location: Option<ThingId>,
        character_id: Option<CharacterId>,
    ) -> Result<ThingId, WorldError> {
        if let Some(loc) = location.filter(|loc| !self.tables.things.contains_key(loc)) {
            return Err(WorldError::NotFound(WorldRecord::Thing(loc)));
        }
        let id = ThingId(self.tables.next_thing);
        self.tables.next_thing += 1;
        self.tables.things.insert(
            id,
            Thing {
                id,
                name: name.into(),
                location,
                character_id,
            },
        );
        self.dirty.things = true;
        Ok(id)
    }

    pub fn remove_thing(&mut self, id: ThingId) -> Option<Thing> {
        let removed = self.tables.things.remove(&id);
        self.dirty.things |= removed.is_some();
        removed
    }

    // -- commit ------------------------------------------------------------

    /// Serializes every touched table into one batch.
    pub(crate) fn into_parts(
        self,
        keys: &DocKeys,
    ) -> Result<(WorldTables, WriteBatch), StorageError> {
        let mut batch = WriteBatch::new();
        if self.dirty.connections {
            put_table(&mut batch, &keys.connections, &self.tables.connections)?;
        }
        if self.dirty.characters {
            put_table(&mut batch, &keys.characters, &self.tables.characters)?;
        }
        if self.dirty.things {
            put_table(&mut batch, &keys.things, &self.tables.things)?;
        }
        Ok((self.tables, batch))
    }
}

fn put_table<K, V: serde::Serialize>(
    batch: &mut WriteBatch,
    key: &str,
    table: &BTreeMap<K, V>,
) -> Result<(), StorageError> {
    let doc = VersionedDoc::new(DOC_VERSION, table.values().collect::<Vec<_>>());
    batch.put_json(key, &doc)?;
    Ok(())
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> WorldTx {
        WorldTx::new(WorldTables::from_records(Vec::new(), Vec::new(), Vec::new()))
    }

    fn thing(id: u64, name: &str) -> Thing {
        Thing {
            id: ThingId(id),
            name: name.into(),
            location: None,
            character_id: None,
        }
    }

    #[test]
    fn test_from_records_continues_ids_after_max() {
        let things = vec![thing(3, "hall"), thing(9, "lamp")];

        let tables = WorldTables::from_records(Vec::new(), Vec::new(), things);

        assert_eq!(tables.next_thing, 10);
        assert_eq!(tables.next_connection, 1);
    }

    #[test]
    fn test_update_character_always_advances_updated_at() {
        let mut tx = tx();
        let added = tx.add_character(Character::new("c1", "Brannoc")).unwrap();
        assert_eq!(added.added_at, added.updated_at);

        let first = tx
            .update_character(Character::new("c1", "Brannoc").with("hp", 3))
            .unwrap()
            .unwrap();
        let second = tx
            .update_character(Character::new("c1", "Brannoc").with("hp", 4))
            .unwrap()
            .unwrap();

        assert_eq!(first.added_at, added.added_at);
        assert!(first.updated_at > added.updated_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn test_update_character_missing_does_not_insert() {
        let mut tx = tx();

        let result = tx.update_character(Character::new("c1", "Brannoc")).unwrap();

        assert!(result.is_none());
        assert!(tx.get_character(&CharacterId::from("c1")).is_none());
    }

    #[test]
    fn test_add_thing_unknown_location_fails() {
        let mut tx = tx();

        let result = tx.add_thing("lamp", Some(ThingId(42)), None);

        assert!(matches!(result, Err(WorldError::NotFound(WorldRecord::Thing(ThingId(42))))));
    }

    #[test]
    fn test_into_parts_only_writes_touched_tables() {
        let mut tx = tx();
        tx.add_thing("hall", None, None).unwrap();
        let keys = DocKeys::new("worlds", "w1");

        let (_tables, batch) = tx.into_parts(&keys).unwrap();
        let ops = batch.into_ops();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].key(), "worlds/w1/things");
    }

    #[test]
    fn test_remove_peer_connections_keeps_local_owner() {
        let mut tx = tx();
        let guest = PeerId::from("guest");
        for peer in [None, Some(guest.clone()), Some(guest.clone())] {
            tx.add_connection(NewConnection {
                peer,
                character_id: CharacterId::from("c1"),
                thing_id: ThingId(1),
                display_name: "x".into(),
            });
        }

        assert_eq!(tx.remove_peer_connections(&guest), 2);
        assert_eq!(tx.tables.connections.len(), 1);
    }
}
