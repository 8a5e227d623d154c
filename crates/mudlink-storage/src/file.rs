//! Filesystem storage backend: one file per key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Storage, StorageError, WriteBatch, WriteOp};

/// Stores each document as `<root>/<encoded key>.json`.
///
/// Keys are percent-encoded into a single flat filename, so a key like
/// `worlds/../../etc` can't escape the root. Writes go to a temporary
/// file first and are renamed into place.
///
/// A batch stages every put as a temporary file before any rename. If
/// staging fails nothing under the root changes. Only a rename failing
/// partway through can leave a batch half applied.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "file storage opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }

    async fn discard(staged: &[(PathBuf, PathBuf)]) {
        for (tmp, _) in staged {
            if let Err(e) = tokio::fs::remove_file(tmp).await {
                tracing::debug!(path = %tmp.display(), error = %e, "failed to discard staged file");
            }
        }
    }
}

impl Storage for FileStorage {
    async fn save_raw(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::trace!(key, bytes = data.len(), "document written");
        Ok(())
    }

    async fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let ops = batch.into_ops();

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for op in &ops {
            if let WriteOp::Put { key, data } = op {
                let path = self.path_for(key);
                let tmp = path.with_extension(format!("json.{}.tmp", staged.len()));
                if let Err(e) = tokio::fs::write(&tmp, data).await {
                    Self::discard(&staged).await;
                    return Err(StorageError::Io(e));
                }
                staged.push((tmp, path));
            }
        }

        // `staged` holds one entry per put, in batch order.
        let mut next = 0;
        for op in ops {
            match op {
                WriteOp::Put { .. } => {
                    let (tmp, path) = &staged[next];
                    if let Err(e) = tokio::fs::rename(tmp, path).await {
                        Self::discard(&staged[next..]).await;
                        return Err(StorageError::Io(e));
                    }
                    next += 1;
                }
                WriteOp::Delete { key } => {
                    if let Err(e) = self.remove(&key).await {
                        Self::discard(&staged[next..]).await;
                        return Err(e);
                    }
                }
            }
        }
        tracing::trace!(files = staged.len(), "batch committed");
        Ok(())
    }
}

/// Percent-encodes everything outside `[A-Za-z0-9_-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
