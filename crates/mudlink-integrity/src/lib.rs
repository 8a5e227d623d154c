//! Canonical content hashing.
//!
//! Peers keep a digest next to every shared character so they can tell
//! whether it changed without shipping or diffing the whole record.
//! For that to work both sides must serialize identically, so [`hash`]
//! first rewrites the value into a canonical form:
//!
//! - object keys are sorted, recursively;
//! - array order is kept (it means something: inventory slots, spell
//!   lists);
//! - output is compact JSON with no insignificant whitespace.
//!
//! The digest is SHA-256, hex encoded.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Errors that can occur while hashing.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The value couldn't be turned into JSON (e.g. a map with
    /// non-string keys).
    #[error("cannot serialize value for hashing: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A lowercase hex SHA-256 digest of a canonicalized record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterHash(String);

impl CharacterHash {
    /// Wraps an existing hex digest (e.g. one received from a peer).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes `value` to canonical JSON: sorted keys, ordered arrays,
/// compact.
pub fn canonical_json<T: Serialize + ?Sized>(
    value: &T,
) -> Result<String, IntegrityError> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

/// Hashes `value` over its canonical form.
pub fn hash<T: Serialize + ?Sized>(
    value: &T,
) -> Result<CharacterHash, IntegrityError> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(CharacterHash(hex))
}

/// Returns `true` if `value` still hashes to `expected`.
///
/// Never fails: a value that can't be serialized simply doesn't match.
pub fn verify<T: Serialize + ?Sized>(value: &T, expected: &CharacterHash) -> bool {
    match hash(value) {
        Ok(actual) => actual == *expected,
        Err(e) => {
            tracing::warn!(error = %e, "integrity check could not hash value");
            false
        }
    }
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), IntegrityError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}
