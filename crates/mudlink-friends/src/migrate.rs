//! Load-time schema migration for roster documents.
//!
//! Version history:
//!
//! - **0**: a bare JSON array of records.
//! - **1**: `{ "version": 1, "entries": [...] }`.
//!
//! Friend records written before world tracking have no `worlds` field,
//! and such records can appear under either version. The backfill runs on
//! every record regardless of version, before any typed decoding.
//!
//! Everything downstream of [`decode_friends`] / [`decode_banned`] sees
//! only the version 1 shape.

use serde::de::DeserializeOwned;
use serde_json::Value;

use mudlink_storage::StorageError;

use crate::{BannedPeer, Friend};

/// The schema version written by this build.
pub(crate) const CURRENT_VERSION: u32 = 1;

/// Records decoded from a document, plus whether they had to be
/// upgraded on the way in.
pub(crate) struct Decoded<T> {
    pub entries: Vec<T>,
    pub migrated: bool,
}

pub(crate) fn decode_friends(
    key: &str,
    raw: &[u8],
) -> Result<Decoded<Friend>, StorageError> {
    decode(key, raw, backfill_worlds)
}

pub(crate) fn decode_banned(
    key: &str,
    raw: &[u8],
) -> Result<Decoded<BannedPeer>, StorageError> {
    decode(key, raw, |record| {
        record.get_mut("friend").is_some_and(backfill_worlds)
    })
}

fn decode<T: DeserializeOwned>(
    key: &str,
    raw: &[u8],
    upgrade: impl Fn(&mut Value) -> bool,
) -> Result<Decoded<T>, StorageError> {
    let doc: Value = serde_json::from_slice(raw).map_err(|source| {
        StorageError::Decode {
            key: key.to_string(),
            source,
        }
    })?;

    let (mut entries, legacy) = match doc {
        doc @ Value::Array(_) => (doc, true),
        Value::Object(mut map) => {
            let version = map.get("version").and_then(Value::as_u64);
            if version != Some(u64::from(CURRENT_VERSION)) {
                return Err(StorageError::CorruptDocument {
                    key: key.to_string(),
                    reason: format!("unsupported version {version:?}"),
                });
            }
            let entries = map.remove("entries").ok_or_else(|| {
                StorageError::CorruptDocument {
                    key: key.to_string(),
                    reason: "missing entries".into(),
                }
            })?;
            (entries, false)
        }
        other => {
            return Err(StorageError::CorruptDocument {
                key: key.to_string(),
                reason: format!("unexpected top-level value {other}"),
            });
        }
    };

    let mut upgraded = false;
    if let Value::Array(records) = &mut entries {
        for record in records {
            upgraded |= upgrade(record);
        }
    }

    let entries = serde_json::from_value(entries).map_err(|source| {
        StorageError::Decode {
            key: key.to_string(),
            source,
        }
    })?;
    Ok(Decoded {
        entries,
        migrated: legacy || upgraded,
    })
}

/// Gives a friend record that predates world tracking an empty `worlds`.
/// Returns `true` if the record changed.
fn backfill_worlds(record: &mut Value) -> bool {
    match record {
        Value::Object(map) if !map.contains_key("worlds") => {
            map.insert("worlds".into(), Value::Array(Vec::new()));
            true
        }
        _ => false,
    }
}
