//! World-scoped persistence for mudlink.
//!
//! A hosted world keeps three tables: live connections, character
//! snapshots, and in-world things. [`WorldStore`] owns them for one
//! world and persists each table as its own document.
//!
//! Changes are made through [`WorldStore::transaction`]: the closure edits
//! a staged copy via [`WorldTx`], and the touched documents are written
//! in a single [`WriteBatch`](mudlink_storage::WriteBatch). If the
//! closure fails or the commit fails, the live tables are unchanged.

mod config;
mod error;
mod store;
mod tx;
mod types;

pub use config::WorldConfig;
pub use error::{WorldError, WorldRecord};
pub use store::WorldStore;
pub use tx::WorldTx;
pub use types::{
    ConnectionId, EnterWorld, NewConnection, Thing, ThingId, WorldCharacter,
    WorldConnection,
};
