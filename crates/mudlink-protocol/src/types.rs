//! Core protocol types.
//!
//! Everything here is either on the wire ([`Envelope`], [`MudMessage`])
//! or shared between the stores ([`Character`] and the id newtypes).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The envelope method owned by the session layer. Envelopes with any
/// other method belong to some other subsystem sharing the channel.
pub const MUD_METHOD: &str = "mud";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a game world.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifies a character. Unique within a world.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// A character record as shared between peers.
///
/// Only `id` and `name` are interpreted here. The rest of the sheet
/// (stats, inventory, notes) rides along in `sheet` untouched; its
/// arithmetic lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(flatten)]
    pub sheet: serde_json::Map<String, serde_json::Value>,
}

impl Character {
    /// Creates a character with an empty sheet.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId(id.into()),
            name: name.into(),
            sheet: serde_json::Map::new(),
        }
    }

    /// Builder-style helper for setting a sheet field.
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.sheet.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// MudMessage: the payload of a "mud" envelope
// ---------------------------------------------------------------------------

/// Session-layer messages exchanged between a guest and its host.
///
/// Internally tagged, so `Command { text: "look" }` travels as
/// `{ "type": "Command", "text": "look" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MudMessage {
    /// Guest → host: "open a session for me."
    Join,

    /// Guest → host: one line of player input.
    Command { text: String },

    /// Host → guest: one line of output for that guest only.
    Output { text: String },

    /// Guest → host: "I'm done, drop my session."
    Leave,
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// Every message on the shared peer channel is an `Envelope`.
///
/// `method` says which subsystem the payload belongs to; `payload` is
/// arbitrary JSON that only that subsystem interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub method: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope for an arbitrary method.
    pub fn new(method: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }

    /// Wraps a [`MudMessage`] in a `"mud"` envelope.
    pub fn mud(msg: &MudMessage) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(msg).map_err(ProtocolError::Encode)?;
        Ok(Self::new(MUD_METHOD, payload))
    }

    /// Returns `true` if this envelope belongs to the session layer.
    pub fn is_mud(&self) -> bool {
        self.method == MUD_METHOD
    }

    /// Extracts the [`MudMessage`] from a `"mud"` envelope.
    ///
    /// # Errors
    /// `InvalidMessage` if the method isn't `"mud"`, `Decode` if the
    /// payload doesn't parse.
    pub fn mud_message(&self) -> Result<MudMessage, ProtocolError> {
        if !self.is_mud() {
            return Err(ProtocolError::InvalidMessage(format!(
                "expected method {MUD_METHOD}, got {}",
                self.method
            )));
        }
        MudMessage::deserialize(&self.payload).map_err(ProtocolError::Decode)
    }
}
