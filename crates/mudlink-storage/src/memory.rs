//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::{Storage, StorageError, WriteBatch, WriteOp};

/// Keeps every document in a `HashMap`.
///
/// A whole [`WriteBatch`] is applied under one lock, so readers never see
/// half of a batch. [`set_read_only`](Self::set_read_only) makes every
/// write fail, which is how callers exercise their failure paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    docs: Mutex<HashMap<String, Vec<u8>>>,
    read_only: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every write returns [`StorageError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }

    /// Lists the stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.docs.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    async fn save_raw(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.check_writable()?;
        self.docs.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.docs.lock().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.docs.lock().await.remove(key);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut docs = self.docs.lock().await;
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { key, data } => {
                    docs.insert(key, data);
                }
                WriteOp::Delete { key } => {
                    docs.remove(&key);
                }
            }
        }
        Ok(())
    }
}
