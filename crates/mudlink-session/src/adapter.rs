//! The session adapter: routes player input and output between the
//! local world and remote peers.
//!
//! One adapter exists per client. It owns the transport, the role state
//! machine, and one engine session per player. It owns no persistent
//! state.
//!
//! # Routing
//!
//! - **Solo**: commands run against the local player's session.
//! - **Hosting**: the local player plays as in solo. Each guest gets its
//!   own session, and every line it produces goes back to that guest
//!   and nobody else.
//! - **Guest**: commands are forwarded to the host; `Output` from the
//!   host is written to the local output sink.

use std::collections::HashMap;

use mudlink_protocol::{Codec, Envelope, JsonCodec, MudMessage};
use mudlink_transport::{PeerId, Transport, TransportError, TransportEvent};
use tokio::sync::mpsc;

use crate::{MudEngine, MudSession, Role, SessionError};

/// Receives lines meant for the local player's screen.
pub type OutputReceiver = mpsc::UnboundedReceiver<String>;

/// What handling one transport event did to the host's guest set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Handled,
    /// A guest's session was dropped, by `Leave` or by disconnect.
    GuestLeft(PeerId),
}

/// Drives a peer session on top of a [`Transport`].
pub struct SessionAdapter<T: Transport, E: MudEngine, C: Codec = JsonCodec> {
    transport: T,
    engine: E,
    codec: C,
    role: Role,

    /// The local player's session, opened by `start()`.
    local_session: Option<E::Session>,

    /// Guest sessions while hosting, keyed by the guest's peer id.
    guests: HashMap<PeerId, E::Session>,

    output: mpsc::UnboundedSender<String>,
}

impl<T: Transport, E: MudEngine> SessionAdapter<T, E, JsonCodec> {
    /// Creates an adapter speaking JSON envelopes.
    ///
    /// Returns the adapter and the receiver for local output lines.
    pub fn new(transport: T, engine: E) -> (Self, OutputReceiver) {
        Self::with_codec(transport, engine, JsonCodec)
    }
}

impl<T: Transport, E: MudEngine, C: Codec> SessionAdapter<T, E, C> {
    pub fn with_codec(transport: T, engine: E, codec: C) -> (Self, OutputReceiver) {
        let (output, rx) = mpsc::unbounded_channel();
        let adapter = Self {
            transport,
            engine,
            codec,
            role: Role::Uninitialized,
            local_session: None,
            guests: HashMap::new(),
            output,
        };
        (adapter, rx)
    }

    // =====================================================================
    // Role transitions
    // =====================================================================

    /// Initializes the transport and enters solo play.
    pub async fn start(&mut self) -> Result<PeerId, SessionError> {
        self.expect_role(Role::Uninitialized, "start")?;

        let id = self
            .transport
            .initialize()
            .await
            .map_err(|e| SessionError::Transport(e.into()))?;

        let mut session = self.engine.open_session(None);
        let greeting = session.on_join();
        self.local_session = Some(session);
        self.role = Role::Solo;
        tracing::info!(peer = %id, "session adapter started");

        self.emit(greeting);
        Ok(id)
    }

    /// Starts serving the local world to guests.
    pub fn start_hosting(&mut self) -> Result<(), SessionError> {
        self.expect_role(Role::Solo, "start hosting")?;
        let host = self.local_id()?;
        tracing::info!(%host, "hosting session");
        self.role = Role::Hosting { host };
        Ok(())
    }

    /// Joins the session hosted by `host`.
    ///
    /// If the host can't be reached the role stays `Solo` and the
    /// transport error is returned.
    pub async fn join_session(&mut self, host: PeerId) -> Result<(), SessionError> {
        self.expect_role(Role::Solo, "join a session")?;

        if let Err(e) = self.send_mud(&host, &MudMessage::Join).await {
            tracing::warn!(%host, error = %e, "join failed");
            return Err(e);
        }
        tracing::info!(%host, "joined session");
        self.role = Role::Guest { host };
        Ok(())
    }

    /// Tears down any host or guest binding and returns to solo play.
    ///
    /// As a guest, a `Leave` is sent to the host first; if that fails it
    /// is only logged. Calling this before `start()` does nothing.
    pub async fn reset(&mut self) {
        if let Role::Guest { host } = &self.role {
            if let Err(e) = self.send_mud(host, &MudMessage::Leave).await {
                tracing::warn!(%host, error = %e, "could not notify host on leave");
            }
        }

        for (_, mut session) in self.guests.drain() {
            session.on_leave();
        }

        if self.role != Role::Uninitialized {
            tracing::debug!(from = %self.role, "session reset");
            self.role = Role::Solo;
        }
    }

    /// Resets, then tears the transport down. The adapter goes back to
    /// `Uninitialized`.
    pub async fn shutdown(&mut self) -> Result<(), SessionError> {
        self.reset().await;
        if let Some(mut session) = self.local_session.take() {
            session.on_leave();
        }
        self.role = Role::Uninitialized;
        self.transport
            .destroy()
            .await
            .map_err(|e| SessionError::Transport(e.into()))
    }

    /// Relay-backed transports aren't available.
    pub fn start_relay(&mut self) -> Result<(), SessionError> {
        Err(SessionError::NotSupported("relay transport"))
    }

    /// Relay-backed hosting isn't available.
    pub fn host_via_relay(&mut self) -> Result<(), SessionError> {
        Err(SessionError::NotSupported("hosting via relay"))
    }

    // =====================================================================
    // Player input
    // =====================================================================

    /// Submits one line of input from the local player.
    pub async fn command(&mut self, text: &str) -> Result<(), SessionError> {
        match &self.role {
            Role::Uninitialized => Err(SessionError::NotStarted),
            Role::Guest { host } => {
                let msg = MudMessage::Command {
                    text: text.to_string(),
                };
                self.send_mud(host, &msg).await
            }
            Role::Solo | Role::Hosting { .. } => {
                let session = self.local_session.as_mut().ok_or(SessionError::NotStarted)?;
                let lines = session.handle_command(text);
                self.emit(lines);
                Ok(())
            }
        }
    }

    // =====================================================================
    // Transport events
    // =====================================================================

    /// Waits for one transport event and handles it.
    ///
    /// Returns `Ok(false)` once the transport has no more events.
    pub async fn pump(&mut self) -> Result<bool, SessionError> {
        match self.transport.recv_event().await {
            Some(event) => {
                self.handle_event(event).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Handles one transport event.
    ///
    /// Reports [`EventOutcome::GuestLeft`] when a guest's session was
    /// dropped, so callers can release whatever else they hold for it.
    pub async fn handle_event(
        &mut self,
        event: TransportEvent,
    ) -> Result<EventOutcome, SessionError> {
        match event {
            TransportEvent::Message { from, data } => self.handle_message(from, &data).await,
            TransportEvent::PeerConnected(peer) => {
                tracing::debug!(%peer, "peer connected");
                Ok(EventOutcome::Handled)
            }
            TransportEvent::PeerDisconnected(peer) => Ok(self.handle_disconnect(peer)),
        }
    }

    async fn handle_message(
        &mut self,
        from: PeerId,
        data: &[u8],
    ) -> Result<EventOutcome, SessionError> {
        let envelope: Envelope = match self.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%from, error = %e, "dropping undecodable message");
                return Ok(EventOutcome::Handled);
            }
        };
        if !envelope.is_mud() {
            tracing::trace!(%from, method = %envelope.method, "ignoring non-mud envelope");
            return Ok(EventOutcome::Handled);
        }
        let msg = match envelope.mud_message() {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%from, error = %e, "dropping malformed mud message");
                return Ok(EventOutcome::Handled);
            }
        };

        if self.role.is_hosting() {
            return self.host_message(from, msg).await;
        }
        if self.role.is_guest() && self.role.host() == Some(&from) {
            match msg {
                MudMessage::Output { text } => self.emit(vec![text]),
                other => tracing::debug!(%from, ?other, "host sent unexpected message"),
            }
            return Ok(EventOutcome::Handled);
        }
        tracing::debug!(%from, role = %self.role, ?msg, "ignoring mud message");
        Ok(EventOutcome::Handled)
    }

    async fn host_message(
        &mut self,
        from: PeerId,
        msg: MudMessage,
    ) -> Result<EventOutcome, SessionError> {
        let lines = match msg {
            MudMessage::Join => {
                if self.guests.contains_key(&from) {
                    tracing::debug!(peer = %from, "duplicate join");
                    return Ok(EventOutcome::Handled);
                }
                let mut session = self.engine.open_session(Some(&from));
                let lines = session.on_join();
                self.guests.insert(from.clone(), session);
                tracing::info!(peer = %from, guests = self.guests.len(), "guest joined");
                lines
            }
            MudMessage::Command { text } => {
                let session = self
                    .guests
                    .entry(from.clone())
                    .or_insert_with(|| self.engine.open_session(Some(&from)));
                session.handle_command(&text)
            }
            MudMessage::Leave => return Ok(self.left(from)),
            MudMessage::Output { .. } => {
                tracing::debug!(peer = %from, "guest sent output; ignoring");
                return Ok(EventOutcome::Handled);
            }
        };

        for text in lines {
            self.send_mud(&from, &MudMessage::Output { text }).await?;
        }
        Ok(EventOutcome::Handled)
    }

    fn handle_disconnect(&mut self, peer: PeerId) -> EventOutcome {
        if self.role.is_hosting() {
            return self.left(peer);
        }
        if self.role.is_guest() && self.role.host() == Some(&peer) {
            tracing::warn!(host = %peer, "host disconnected; back to solo play");
            self.role = Role::Solo;
        } else {
            tracing::debug!(%peer, "peer disconnected");
        }
        EventOutcome::Handled
    }

    fn left(&mut self, peer: PeerId) -> EventOutcome {
        if self.drop_guest(&peer) {
            EventOutcome::GuestLeft(peer)
        } else {
            EventOutcome::Handled
        }
    }

    /// Closes `peer`'s guest session, if it has one. Returns whether a
    /// session was dropped.
    pub fn drop_guest(&mut self, peer: &PeerId) -> bool {
        let Some(mut session) = self.guests.remove(peer) else {
            return false;
        };
        session.on_leave();
        tracing::info!(%peer, guests = self.guests.len(), "guest left");
        true
    }

    // =====================================================================
    // Introspection
    // =====================================================================

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn local_peer_id(&self) -> Option<&PeerId> {
        self.transport.local_peer_id()
    }

    pub fn host_peer_id(&self) -> Option<&PeerId> {
        self.role.host()
    }

    pub fn guest_count(&self) -> usize {
        self.guests.len()
    }

    /// Peers with an open session on this host, sorted.
    pub fn guest_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.guests.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // =====================================================================
    // Sending
    // =====================================================================

    /// Sends an envelope for another subsystem over the shared channel.
    pub async fn send_envelope(
        &self,
        peer: &PeerId,
        envelope: &Envelope,
    ) -> Result<(), SessionError> {
        let bytes = self.codec.encode(envelope)?;
        self.transport
            .send_message(peer, &bytes)
            .await
            .map_err(|e| SessionError::Transport(e.into()))
    }

    async fn send_mud(&self, peer: &PeerId, msg: &MudMessage) -> Result<(), SessionError> {
        self.send_envelope(peer, &Envelope::mud(msg)?).await
    }

    fn emit(&self, lines: Vec<String>) {
        for line in lines {
            if self.output.send(line).is_err() {
                tracing::trace!("output receiver dropped");
                return;
            }
        }
    }

    fn local_id(&self) -> Result<PeerId, SessionError> {
        self.transport
            .local_peer_id()
            .cloned()
            .ok_or(SessionError::Transport(TransportError::NotInitialized))
    }

    fn expect_role(&self, expected: Role, action: &'static str) -> Result<(), SessionError> {
        if self.role == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.role.clone(),
                action,
            })
        }
    }
}
