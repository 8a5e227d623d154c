//! Peer session layer for mudlink.
//!
//! Lets one client host its single-player world for others. The
//! [`SessionAdapter`] sits between a [`Transport`](mudlink_transport::Transport)
//! and the world logic:
//!
//! 1. **Role**: an explicit state machine ([`Role`]): solo, hosting, or
//!    guest, with `reset()` as the single way back to solo
//! 2. **Routing**: one [`MudSession`] per player; output never leaks
//!    between guests
//! 3. **World logic**: plugged in through [`MudEngine`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Client facade (above)  ← pumps events, filters banned peers
//!     ↕
//! Session layer (this crate)  ← roles, per-peer sessions, mud envelopes
//!     ↕
//! Transport + protocol (below)  ← PeerId, Envelope, MudMessage
//! ```

#![allow(async_fn_in_trait)]

mod adapter;
mod engine;
mod error;
mod role;

pub use adapter::{EventOutcome, OutputReceiver, SessionAdapter};
pub use engine::{MudEngine, MudSession};
pub use error::SessionError;
pub use role::Role;
