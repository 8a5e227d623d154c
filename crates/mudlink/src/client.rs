//! `MudlinkClient` builder and event loop.
//!
//! This is the entry point for a mudlink client. It ties together all
//! the layers: transport → session adapter, with the friends roster and
//! the open world stores alongside.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use mudlink_friends::{Friend, FriendsRoster, Presence, RosterConfig};
use mudlink_protocol::WorldId;
use mudlink_session::{EventOutcome, MudEngine, OutputReceiver, SessionAdapter};
use mudlink_storage::Storage;
use mudlink_transport::{PeerId, Transport, TransportEvent};
use mudlink_world::{WorldConfig, WorldStore};

use crate::{ClientConfig, MudlinkError};

/// Builder for configuring a [`MudlinkClient`].
///
/// # Example
///
/// ```rust,ignore
/// use mudlink::prelude::*;
///
/// let storage = Arc::new(MemoryStorage::new());
/// let (mut client, output) = MudlinkClientBuilder::new()
///     .build(MemoryNetwork::new().endpoint(), MyEngine, storage)
///     .await;
/// client.start().await?;
/// client.run().await
/// ```
#[derive(Debug, Default)]
pub struct MudlinkClientBuilder {
    config: ClientConfig,
}

impl MudlinkClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where the roster keeps its documents.
    pub fn roster_config(mut self, config: RosterConfig) -> Self {
        self.config.roster = config;
        self
    }

    /// Sets where world documents are kept.
    pub fn world_config(mut self, config: WorldConfig) -> Self {
        self.config.world = config;
        self
    }

    /// Loads the roster from `storage` and wires up the session adapter.
    ///
    /// Returns the client and the receiver for the local player's output.
    pub async fn build<T, E, S>(
        self,
        transport: T,
        engine: E,
        storage: S,
    ) -> (MudlinkClient<T, E, S>, OutputReceiver)
    where
        T: Transport,
        E: MudEngine,
        S: Storage + Clone,
    {
        let roster = FriendsRoster::load(storage.clone(), self.config.roster.clone()).await;
        let (adapter, output) = SessionAdapter::new(transport, engine);
        let client = MudlinkClient {
            adapter,
            roster,
            storage,
            config: self.config,
            worlds: HashMap::new(),
        };
        (client, output)
    }
}

/// One player's client: a session adapter, a friends roster, and the
/// worlds currently open.
///
/// Call [`start()`](Self::start), then drive it with
/// [`run()`](Self::run) or [`process_next_event()`](Self::process_next_event).
pub struct MudlinkClient<T: Transport, E: MudEngine, S: Storage + Clone> {
    adapter: SessionAdapter<T, E>,
    roster: FriendsRoster<S>,
    storage: S,
    config: ClientConfig,
    worlds: HashMap<WorldId, WorldStore<S>>,
}

impl<T, E, S> MudlinkClient<T, E, S>
where
    T: Transport,
    E: MudEngine,
    S: Storage + Clone,
{
    /// Brings the transport up and tells the roster who we are.
    pub async fn start(&mut self) -> Result<PeerId, MudlinkError> {
        let id = self.adapter.start().await?;
        self.roster.set_local_peer_id(id.clone());
        Ok(id)
    }

    pub fn adapter(&self) -> &SessionAdapter<T, E> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut SessionAdapter<T, E> {
        &mut self.adapter
    }

    pub fn roster(&self) -> &FriendsRoster<S> {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut FriendsRoster<S> {
        &mut self.roster
    }

    /// Bans `peer` and cuts it off: its guest session is closed and its
    /// connections in every open world are removed.
    pub async fn ban_peer(&mut self, peer: &PeerId, snapshot: Friend) -> Result<(), MudlinkError> {
        self.roster.ban_peer(peer, snapshot).await?;
        if self.adapter.drop_guest(peer) {
            tracing::info!(%peer, "banned guest removed from session");
        }
        self.drop_peer_connections(peer).await;
        Ok(())
    }

    // =====================================================================
    // Worlds
    // =====================================================================

    /// Opens a world store, or returns the one already open.
    pub async fn open_world(&mut self, id: WorldId) -> Result<&mut WorldStore<S>, MudlinkError> {
        match self.worlds.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let store =
                    WorldStore::open(self.storage.clone(), entry.key().clone(), &self.config.world)
                        .await?;
                Ok(entry.insert(store))
            }
        }
    }

    pub fn world(&self, id: &WorldId) -> Option<&WorldStore<S>> {
        self.worlds.get(id)
    }

    pub fn world_mut(&mut self, id: &WorldId) -> Option<&mut WorldStore<S>> {
        self.worlds.get_mut(id)
    }

    /// Closes a world, dropping its live connections. Closing a world
    /// that isn't open is a no-op.
    pub async fn close_world(&mut self, id: &WorldId) -> Result<(), MudlinkError> {
        if let Some(store) = self.worlds.remove(id) {
            store.close().await?;
        }
        Ok(())
    }

    // =====================================================================
    // Event loop
    // =====================================================================

    /// Waits for one transport event and dispatches it.
    ///
    /// Traffic from banned peers is dropped before the adapter sees it.
    /// Friends' presence follows their connect and disconnect events. A
    /// peer that disconnects, or a guest that leaves, loses its world
    /// connections. Errors from the adapter are logged, not returned.
    ///
    /// Returns `false` once the transport has no more events.
    pub async fn process_next_event(&mut self) -> bool {
        let Some(event) = self.adapter.transport().recv_event().await else {
            return false;
        };

        match &event {
            TransportEvent::Message { from, .. } if self.roster.is_banned(from) => {
                tracing::debug!(peer = %from, "dropping message from banned peer");
                return true;
            }
            TransportEvent::PeerConnected(peer) => {
                if self.roster.is_banned(peer) {
                    tracing::debug!(%peer, "banned peer connected");
                    return true;
                }
                self.update_presence(peer, Presence::Online).await;
            }
            TransportEvent::PeerDisconnected(peer) => {
                self.update_presence(peer, Presence::Offline).await;
                self.drop_peer_connections(peer).await;
            }
            TransportEvent::Message { .. } => {}
        }

        match self.adapter.handle_event(event).await {
            Ok(EventOutcome::GuestLeft(peer)) => self.drop_peer_connections(&peer).await,
            Ok(EventOutcome::Handled) => {}
            Err(e) => tracing::warn!(error = %e, "failed to handle transport event"),
        }
        true
    }

    /// Processes events until the transport shuts down.
    pub async fn run(&mut self) {
        tracing::info!(role = %self.adapter.role(), "mudlink client running");
        while self.process_next_event().await {}
        tracing::info!("transport closed; client loop finished");
    }

    /// Closes every open world and tears the transport down.
    pub async fn shutdown(&mut self) -> Result<(), MudlinkError> {
        let ids: Vec<_> = self.worlds.keys().cloned().collect();
        for id in ids {
            self.close_world(&id).await?;
        }
        self.adapter.shutdown().await?;
        Ok(())
    }

    async fn update_presence(&mut self, peer: &PeerId, presence: Presence) {
        if !self.roster.is_friend(peer) {
            return;
        }
        if let Err(e) = self.roster.set_presence(peer, presence).await {
            tracing::warn!(%peer, error = %e, "failed to record presence");
        }
    }

    async fn drop_peer_connections(&mut self, peer: &PeerId) {
        for (world, store) in &mut self.worlds {
            if let Err(e) = store.remove_peer_connections(peer).await {
                tracing::warn!(%world, %peer, error = %e, "failed to drop peer connections");
            }
        }
    }
}
