//! The adapter's role state machine.

use std::fmt;

use mudlink_transport::PeerId;

/// What part the local client plays in a peer session.
///
/// ```text
///                 start()           start_hosting()
/// Uninitialized ─────────→ Solo ───────────────────→ Hosting
///                           │  ←──────── reset() ───────┘
///                           │
///                           └─ join_session(host) ──→ Guest
///                              ←──────── reset() ───────┘
/// ```
///
/// A guest whose host disconnects falls back to `Solo` on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Uninitialized,
    /// Playing alone against the local world.
    Solo,
    /// Serving the local world to guests. `host` is our own id.
    Hosting { host: PeerId },
    /// Playing in a world hosted by `host`.
    Guest { host: PeerId },
}

impl Role {
    /// The session host, if there is one.
    pub fn host(&self) -> Option<&PeerId> {
        match self {
            Self::Hosting { host } | Self::Guest { host } => Some(host),
            Self::Uninitialized | Self::Solo => None,
        }
    }

    pub fn is_hosting(&self) -> bool {
        matches!(self, Self::Hosting { .. })
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest { .. })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Solo => write!(f, "solo"),
            Self::Hosting { .. } => write!(f, "hosting"),
            Self::Guest { host } => write!(f, "guest of {host}"),
        }
    }
}
