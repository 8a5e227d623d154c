//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// payload that doesn't match the envelope's method.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. a `"mud"`
    /// payload was expected and something else arrived.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
