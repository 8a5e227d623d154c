/// Errors that can occur in a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend's I/O failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A value couldn't be serialized for saving.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored document couldn't be parsed.
    #[error("decode of {key} failed: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored document parsed but has a shape or version this build
    /// doesn't understand.
    #[error("document {key} is corrupt: {reason}")]
    CorruptDocument { key: String, reason: String },

    /// The backend is refusing writes.
    #[error("storage is read-only")]
    ReadOnly,
}
