//! Key/value document storage for mudlink.
//!
//! The roster and world stores persist through the [`Storage`] trait and
//! never know what sits behind it. A backend only has to move bytes
//! under string keys; JSON encoding is layered on top by the provided
//! [`Storage::save`] / [`Storage::load`] methods.
//!
//! # Backends
//!
//! - [`MemoryStorage`]: a `HashMap` behind a mutex. Batches are atomic.
//! - [`FileStorage`]: one JSON file per key under a root directory.
//!   Each file is replaced atomically. A batch is staged in full before
//!   any file is replaced, so a failed write leaves every file untouched.

#![allow(async_fn_in_trait)]

mod batch;
mod error;
mod file;
mod memory;

pub use batch::{WriteBatch, WriteOp};
pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// An async key/value document store.
pub trait Storage: Send + Sync + 'static {
    /// Stores `data` under `key`, replacing any previous value.
    async fn save_raw(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Loads the bytes stored under `key`, or `None` if there are none.
    async fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deletes `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Applies every operation in `batch`.
    ///
    /// Backends that can apply a batch atomically override this. The
    /// default applies operations one by one and stops at the first
    /// failure.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { key, data } => self.save_raw(&key, data).await?,
                WriteOp::Delete { key } => self.remove(&key).await?,
            }
        }
        Ok(())
    }

    /// Serializes `value` as JSON and stores it under `key`.
    async fn save<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_vec(value).map_err(StorageError::Encode)?;
        self.save_raw(key, data).await
    }

    /// Loads and deserializes the JSON document under `key`.
    async fn load<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.load_raw(key).await? {
            Some(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

impl<S: Storage> Storage for Arc<S> {
    async fn save_raw(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        (**self).save_raw(key, data).await
    }

    async fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).load_raw(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        (**self).commit(batch).await
    }
}

/// A persisted collection tagged with its schema version.
///
/// Stores write the current version; loaders look at `version` and run
/// their migration before handing records to the rest of the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDoc<T> {
    pub version: u32,
    pub entries: T,
}

impl<T> VersionedDoc<T> {
    pub fn new(version: u32, entries: T) -> Self {
        Self { version, entries }
    }
}
