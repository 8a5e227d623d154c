//! Wire protocol and shared types for mudlink.
//!
//! - **Types** ([`Envelope`], [`MudMessage`], [`Character`], ids): what
//!   travels between peers and what the stores share.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   bytes for the transport.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (host/guest routing)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use mudlink_transport::PeerId;
pub use types::{
    Character, CharacterId, Envelope, MUD_METHOD, MudMessage, WorldId,
};
