//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The session layer never touches a serialization library directly; it
//! goes through a [`Codec`]. [`JsonCodec`] is the only implementation
//! today, which keeps envelopes readable in browser devtools on the
//! other end of the wire.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use mudlink_protocol::{Codec, Envelope, JsonCodec, MudMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::mud(&MudMessage::Command { text: "look".into() }).unwrap();
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, MudMessage};

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encodes_envelope_as_method_and_payload() {
        let env = Envelope::mud(&MudMessage::Leave).unwrap();
        let bytes = JsonCodec.encode(&env).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["method"], "mud");
        assert_eq!(json["payload"]["type"], "Leave");
    }
}
