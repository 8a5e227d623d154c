//! # mudlink
//!
//! Peer-hosted sessions for browser MUD clients.
//!
//! One client hosts its single-player world and others join as guests;
//! around that sit a friends roster with a ban list, content hashes for
//! shared characters, and per-world storage. World logic plugs in through
//! the [`MudEngine`](mudlink_session::MudEngine) trait; everything else is
//! wired together by [`MudlinkClient`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mudlink::prelude::*;
//!
//! // Implement MudEngine for your world, then:
//! // let (mut client, output) = MudlinkClientBuilder::new()
//! //     .build(transport, MyEngine, storage)
//! //     .await;
//! // client.start().await?;
//! // client.run().await;
//! ```

mod client;
mod config;
mod error;
pub mod logging;

pub use client::{MudlinkClient, MudlinkClientBuilder};
pub use config::ClientConfig;
pub use error::MudlinkError;

pub use mudlink_friends as friends;
pub use mudlink_integrity as integrity;
pub use mudlink_protocol as protocol;
pub use mudlink_session as session;
pub use mudlink_storage as storage;
pub use mudlink_transport as transport;
pub use mudlink_world as world;

/// The types most clients need, in one import.
pub mod prelude {
    pub use crate::{ClientConfig, MudlinkClient, MudlinkClientBuilder, MudlinkError};
    pub use mudlink_friends::{
        BannedPeer, Friend, FriendCharacter, FriendWorld, FriendsError, FriendsRoster,
        Presence, RosterConfig,
    };
    pub use mudlink_integrity::CharacterHash;
    pub use mudlink_protocol::{
        Character, CharacterId, Envelope, MudMessage, PeerId, WorldId,
    };
    pub use mudlink_session::{
        EventOutcome, MudEngine, MudSession, OutputReceiver, Role, SessionAdapter,
        SessionError,
    };
    pub use mudlink_storage::{FileStorage, MemoryStorage, Storage};
    pub use mudlink_transport::{
        MemoryNetwork, MemoryTransport, Transport, TransportError, TransportEvent,
    };
    pub use mudlink_world::{
        ConnectionId, EnterWorld, NewConnection, Thing, ThingId, WorldCharacter,
        WorldConfig, WorldConnection, WorldError, WorldStore,
    };
}
