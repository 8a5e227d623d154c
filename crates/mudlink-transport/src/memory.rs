//! In-process transport: every endpoint on a [`MemoryNetwork`] can reach
//! every other endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, mpsc};

use crate::{PeerId, Transport, TransportError, TransportEvent};

type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A shared, in-memory full mesh of peers.
///
/// Cheap to clone; all clones see the same set of registered peers.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    peers: Arc<Mutex<HashMap<PeerId, EventSender>>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an endpoint with a random peer id.
    pub fn endpoint(&self) -> MemoryTransport {
        self.endpoint_with_id(generate_peer_id())
    }

    /// Creates an endpoint that will register as `id`.
    pub fn endpoint_with_id(&self, id: impl Into<PeerId>) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        MemoryTransport {
            network: self.clone(),
            id: id.into(),
            initialized: false,
            destroyed: false,
            tx: Some(tx),
            rx: Mutex::new(rx),
        }
    }

    /// Returns the ids of every registered peer.
    pub async fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> =
            self.peers.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// One endpoint on a [`MemoryNetwork`].
pub struct MemoryTransport {
    network: MemoryNetwork,
    id: PeerId,
    initialized: bool,
    destroyed: bool,
    /// Our own inbox sender. Taken on destroy so the inbox can close.
    tx: Option<EventSender>,
    rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl Transport for MemoryTransport {
    type Error = TransportError;

    async fn initialize(&mut self) -> Result<PeerId, Self::Error> {
        if self.destroyed {
            return Err(TransportError::Shutdown);
        }
        if self.initialized {
            return Ok(self.id.clone());
        }
        let own_tx = self.tx.clone().ok_or(TransportError::Shutdown)?;

        let mut peers = self.network.peers.lock().await;
        if peers.contains_key(&self.id) {
            return Err(TransportError::AlreadyRegistered(self.id.clone()));
        }

        for (peer, tx) in peers.iter() {
            let _ = tx.send(TransportEvent::PeerConnected(self.id.clone()));
            let _ = own_tx.send(TransportEvent::PeerConnected(peer.clone()));
        }
        peers.insert(self.id.clone(), own_tx);
        self.initialized = true;

        tracing::debug!(peer = %self.id, "memory transport online");
        Ok(self.id.clone())
    }

    async fn send_message(
        &self,
        peer: &PeerId,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        if self.destroyed {
            return Err(TransportError::Shutdown);
        }
        if !self.initialized {
            return Err(TransportError::NotInitialized);
        }

        let peers = self.network.peers.lock().await;
        let target = peers
            .get(peer)
            .ok_or_else(|| TransportError::PeerUnreachable(peer.clone()))?;
        target
            .send(TransportEvent::Message {
                from: self.id.clone(),
                data: data.to_vec(),
            })
            .map_err(|_| TransportError::PeerUnreachable(peer.clone()))?;

        tracing::trace!(from = %self.id, to = %peer, bytes = data.len(), "sent");
        Ok(())
    }

    async fn recv_event(&self) -> Option<TransportEvent> {
        self.rx.lock().await.recv().await
    }

    async fn destroy(&mut self) -> Result<(), Self::Error> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        self.tx = None;

        if self.initialized {
            let mut peers = self.network.peers.lock().await;
            peers.remove(&self.id);
            for tx in peers.values() {
                let _ =
                    tx.send(TransportEvent::PeerDisconnected(self.id.clone()));
            }
            tracing::debug!(peer = %self.id, "memory transport offline");
        }
        self.initialized = false;
        Ok(())
    }

    fn local_peer_id(&self) -> Option<&PeerId> {
        self.initialized.then_some(&self.id)
    }
}

/// Generates a random 32-character hex peer id (128 bits).
fn generate_peer_id() -> PeerId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    PeerId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
