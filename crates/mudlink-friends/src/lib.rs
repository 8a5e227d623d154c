//! Friends roster for mudlink.
//!
//! Tracks trusted peers, the ban list, and the worlds and characters
//! shared with each friend. Both collections persist through
//! [`mudlink_storage::Storage`] as versioned documents; older
//! documents are upgraded when loaded.
//!
//! # Key types
//!
//! - [`FriendsRoster`]: the manager; all reads and writes go through it
//! - [`Friend`] / [`BannedPeer`]: roster records
//! - [`FriendWorld`] / [`FriendCharacter`]: shared-world tracking
//! - [`RosterConfig`]: storage keys

mod config;
mod error;
mod migrate;
mod roster;
mod types;

pub use config::RosterConfig;
pub use error::{FriendsError, RosterEntry};
pub use roster::{FriendsRoster, unreadable_key};
pub use types::{BannedPeer, Friend, FriendCharacter, FriendWorld, Presence};
