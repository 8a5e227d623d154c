//! Grouped writes.

use serde::Serialize;

use crate::StorageError;

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, data: Vec<u8> },
    Delete { key: String },
}

impl WriteOp {
    /// The key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered set of writes to apply together via
/// [`Storage::commit`](crate::Storage::commit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw bytes under `key`.
    pub fn put(&mut self, key: impl Into<String>, data: Vec<u8>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            key: key.into(),
            data,
        });
        self
    }

    /// Queues `value` serialized as JSON under `key`.
    pub fn put_json<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, StorageError> {
        let data = serde_json::to_vec(value).map_err(StorageError::Encode)?;
        Ok(self.put(key, data))
    }

    /// Queues a delete of `key`.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
