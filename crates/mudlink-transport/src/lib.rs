//! Transport abstraction layer for mudlink.
//!
//! Provides the [`Transport`] trait that the session layer is written
//! against. A transport knows how to reach other peers by their
//! [`PeerId`] and surfaces everything that happens on the wire as a
//! stream of [`TransportEvent`]s: inbound messages, peers appearing,
//! peers going away.
//!
//! The concrete network (a relay server, WebRTC data channels, ...) is
//! not part of this crate. [`MemoryNetwork`] is an in-process full mesh
//! used by tests and local demos.

#![allow(async_fn_in_trait)]

mod error;
mod memory;

pub use error::TransportError;
pub use memory::{MemoryNetwork, MemoryTransport};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier naming a remote endpoint.
///
/// Identity is established by the transport itself; this layer never
/// authenticates it. `#[serde(transparent)]` keeps the wire form a plain
/// string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a `PeerId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Something that happened on the transport.
///
/// This is the pull-based form of the usual `onMessage` /
/// `onPeerConnect` / `onPeerDisconnect` callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A message arrived from `from`.
    Message { from: PeerId, data: Vec<u8> },

    /// A peer became reachable.
    PeerConnected(PeerId),

    /// A peer went away. Sends to it now fail with
    /// [`TransportError::PeerUnreachable`].
    PeerDisconnected(PeerId),
}

/// A peer-to-peer message channel.
///
/// Messages from one peer are delivered in the order they were sent.
/// Nothing is promised about the relative order of messages from two
/// different peers.
pub trait Transport: Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + Into<TransportError>;

    /// Brings the endpoint online and returns the local peer id.
    ///
    /// Calling it again on an initialized transport returns the same id.
    async fn initialize(&mut self) -> Result<PeerId, Self::Error>;

    /// Sends one message to `peer`.
    ///
    /// Fails with [`TransportError::PeerUnreachable`] when `peer` is not
    /// connected. No retry is attempted.
    async fn send_message(
        &self,
        peer: &PeerId,
        data: &[u8],
    ) -> Result<(), Self::Error>;

    /// Waits for the next transport event.
    ///
    /// Returns `None` once the transport has been destroyed and every
    /// buffered event has been drained.
    async fn recv_event(&self) -> Option<TransportEvent>;

    /// Takes the endpoint offline. Connected peers observe a
    /// [`TransportEvent::PeerDisconnected`].
    async fn destroy(&mut self) -> Result<(), Self::Error>;

    /// The local peer id, once initialized.
    fn local_peer_id(&self) -> Option<&PeerId>;
}
