//! The extension point for world logic.
//!
//! The adapter knows nothing about rooms, parsers, or character sheets.
//! It asks a [`MudEngine`] for one [`MudSession`] per player and feeds
//! each session its own player's commands. Whatever lines a session
//! returns go back to that player only.

use mudlink_transport::PeerId;

/// Creates a player session against the local world.
pub trait MudEngine: Send + 'static {
    type Session: MudSession;

    /// Opens a session for `peer`, or for the local player when `None`.
    fn open_session(&self, peer: Option<&PeerId>) -> Self::Session;
}

/// One player's view of the world.
pub trait MudSession: Send + 'static {
    /// Called once when the session opens. Default: no greeting.
    fn on_join(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// Runs one line of input, returning the output lines for this player.
    fn handle_command(&mut self, text: &str) -> Vec<String>;

    /// Called when the player leaves or disconnects. Default: no-op.
    fn on_leave(&mut self) {}
}
