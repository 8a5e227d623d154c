//! The per-world store.

use mudlink_integrity::{self as integrity, CharacterHash};
use mudlink_protocol::{Character, CharacterId, PeerId, WorldId};
use mudlink_storage::{Storage, StorageError, VersionedDoc};
use serde::de::DeserializeOwned;

use crate::tx::{DOC_VERSION, DocKeys, WorldTables, WorldTx};
use crate::{
    ConnectionId, EnterWorld, NewConnection, Thing, ThingId, WorldCharacter,
    WorldConfig, WorldConnection, WorldError,
};

/// Connections, characters, and things of one hosted world.
///
/// Every mutation runs as a [`transaction`](Self::transaction): it is
/// staged on a copy, committed as one storage batch, and only then made
/// visible. Reads return clones.
pub struct WorldStore<S: Storage> {
    storage: S,
    world_id: WorldId,
    keys: DocKeys,
    tables: WorldTables,
}

impl<S: Storage> WorldStore<S> {
    /// Loads the world's documents, starting empty where none exist.
    pub async fn open(
        storage: S,
        world_id: WorldId,
        config: &WorldConfig,
    ) -> Result<Self, WorldError> {
        let keys = DocKeys::new(&config.key_prefix, &world_id.0);
        let connections = load_table(&storage, &keys.connections).await?;
        let characters = load_table(&storage, &keys.characters).await?;
        let things = load_table(&storage, &keys.things).await?;

        let tables = WorldTables::from_records(connections, characters, things);
        tracing::info!(
            world = %world_id,
            characters = tables.characters.len(),
            things = tables.things.len(),
            "world opened"
        );
        Ok(Self {
            storage,
            world_id,
            keys,
            tables,
        })
    }

    /// Drops every live connection and persists the empty table.
    ///
    /// Characters and things are kept.
    pub async fn close(mut self) -> Result<(), WorldError> {
        let world = self.world_id.clone();
        let dropped = self.transaction(|tx| Ok(tx.clear_connections())).await?;
        tracing::info!(%world, dropped, "world closed");
        Ok(())
    }

    pub fn world_id(&self) -> &WorldId {
        &self.world_id
    }

    /// Runs `f` against a staged copy of the tables and commits the
    /// documents it touched in one batch.
    ///
    /// If `f` returns an error, or the commit fails, nothing changes.
    pub async fn transaction<R>(
        &mut self,
        f: impl FnOnce(&mut WorldTx) -> Result<R, WorldError>,
    ) -> Result<R, WorldError> {
        let mut tx = WorldTx::new(self.tables.clone());
        let result = match f(&mut tx) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(world = %self.world_id, error = %e, "transaction rolled back");
                return Err(e);
            }
        };

        let (tables, batch) = tx.into_parts(&self.keys)?;
        if !batch.is_empty() {
            if let Err(e) = self.storage.commit(batch).await {
                tracing::warn!(world = %self.world_id, error = %e, "commit failed; rolled back");
                return Err(e.into());
            }
        }
        self.tables = tables;
        Ok(result)
    }

    // =====================================================================
    // Connections
    // =====================================================================

    pub async fn add_connection(&mut self, new: NewConnection) -> Result<ConnectionId, WorldError> {
        self.transaction(|tx| Ok(tx.add_connection(new))).await
    }

    pub fn get_connection(&self, id: ConnectionId) -> Option<WorldConnection> {
        self.tables.connections.get(&id).cloned()
    }

    /// Replaces a connection record. Unknown ids are logged and ignored.
    pub async fn update_connection(
        &mut self,
        connection: WorldConnection,
    ) -> Result<(), WorldError> {
        self.transaction(|tx| {
            tx.update_connection(connection);
            Ok(())
        })
        .await
    }

    /// Removes a connection. Removing an unknown id is a no-op.
    pub async fn remove_connection(&mut self, id: ConnectionId) -> Result<(), WorldError> {
        self.transaction(|tx| {
            tx.remove_connection(id);
            Ok(())
        })
        .await
    }

    /// Connections held by `peer`, or by the local owner when `None`.
    pub fn connections_for(&self, peer: Option<&PeerId>) -> Vec<WorldConnection> {
        self.tables
            .connections
            .values()
            .filter(|c| c.peer.as_ref() == peer)
            .cloned()
            .collect()
    }

    pub fn connections(&self) -> Vec<WorldConnection> {
        self.tables.connections.values().cloned().collect()
    }

    /// Drops everything `peer` had open, e.g. after it disconnected.
    pub async fn remove_peer_connections(&mut self, peer: &PeerId) -> Result<usize, WorldError> {
        let removed = self
            .transaction(|tx| Ok(tx.remove_peer_connections(peer)))
            .await?;
        if removed > 0 {
            tracing::debug!(world = %self.world_id, %peer, removed, "peer connections dropped");
        }
        Ok(removed)
    }

    // =====================================================================
    // Characters
    // =====================================================================

    pub async fn add_character(
        &mut self,
        character: Character,
    ) -> Result<WorldCharacter, WorldError> {
        self.transaction(|tx| tx.add_character(character)).await
    }

    /// Replaces a stored snapshot. Returns `Ok(None)` if the character
    /// was never added; nothing is inserted in that case.
    pub async fn update_character(
        &mut self,
        character: Character,
    ) -> Result<Option<WorldCharacter>, WorldError> {
        self.transaction(|tx| tx.update_character(character)).await
    }

    pub fn get_character(&self, id: &CharacterId) -> Option<WorldCharacter> {
        self.tables.characters.get(id).cloned()
    }

    pub fn characters(&self) -> Vec<WorldCharacter> {
        self.tables.characters.values().cloned().collect()
    }

    pub async fn remove_character(&mut self, id: &CharacterId) -> Result<(), WorldError> {
        self.transaction(|tx| {
            tx.remove_character(id);
            Ok(())
        })
        .await
    }

    /// Returns `true` if the stored snapshot of `id` hashes to `expected`.
    pub fn verify_character(&self, id: &CharacterId, expected: &CharacterHash) -> bool {
        self.tables
            .characters
            .get(id)
            .is_some_and(|stored| integrity::verify(&stored.character, expected))
    }

    // =====================================================================
    // Things
    // =====================================================================

    pub fn get_thing(&self, id: ThingId) -> Option<Thing> {
        self.tables.things.get(&id).cloned()
    }

    pub fn things(&self) -> Vec<Thing> {
        self.tables.things.values().cloned().collect()
    }

    /// The character a thing stands for, if any.
    pub fn character_for_thing(&self, id: ThingId) -> Option<WorldCharacter> {
        let character_id = self.tables.things.get(&id)?.character_id.as_ref()?;
        self.get_character(character_id)
    }

    // =====================================================================
    // Composite operations
    // =====================================================================

    /// Places a character in the world: creates its avatar thing, stores
    /// or refreshes the character snapshot, and records the connection.
    pub async fn enter_world(
        &mut self,
        enter: EnterWorld,
    ) -> Result<(ThingId, ConnectionId), WorldError> {
        let EnterWorld {
            character,
            thing_name,
            location,
            peer,
            display_name,
        } = enter;
        let character_id = character.id.clone();

        let (thing_id, connection_id) = self
            .transaction(|tx| {
                let thing_id = tx.add_thing(thing_name, location, Some(character_id.clone()))?;
                if tx.get_character(&character_id).is_some() {
                    tx.update_character(character)?;
                } else {
                    tx.add_character(character)?;
                }
                let connection_id = tx.add_connection(NewConnection {
                    peer,
                    character_id: character_id.clone(),
                    thing_id,
                    display_name,
                });
                Ok((thing_id, connection_id))
            })
            .await?;

        tracing::info!(
            world = %self.world_id,
            character = %character_id,
            thing = %thing_id,
            connection = %connection_id,
            "character entered world"
        );
        Ok((thing_id, connection_id))
    }

    /// Removes a connection together with its avatar thing. The character
    /// snapshot stays. Returns the removed connection, or `None` if the
    /// id was unknown.
    pub async fn leave_world(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Option<WorldConnection>, WorldError> {
        let removed = self
            .transaction(|tx| {
                let removed = tx.remove_connection(connection_id);
                if let Some(conn) = &removed {
                    tx.remove_thing(conn.thing_id);
                }
                Ok(removed)
            })
            .await?;
        if removed.is_some() {
            tracing::info!(world = %self.world_id, connection = %connection_id, "left world");
        }
        Ok(removed)
    }
}

/// Loads one table document; a missing key is an empty table.
async fn load_table<S: Storage, T: DeserializeOwned>(
    storage: &S,
    key: &str,
) -> Result<Vec<T>, StorageError> {
    let Some(doc) = storage.load::<VersionedDoc<Vec<T>>>(key).await? else {
        return Ok(Vec::new());
    };
    if doc.version != DOC_VERSION {
        return Err(StorageError::CorruptDocument {
            key: key.to_string(),
            reason: format!("unsupported version {}", doc.version),
        });
    }
    Ok(doc.entries)
}
