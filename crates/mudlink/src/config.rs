use mudlink_friends::RosterConfig;
use mudlink_world::WorldConfig;

/// Settings for a [`MudlinkClient`](crate::MudlinkClient).
///
/// Every field has a working default, so most callers only touch the
/// storage keys when two clients share one backend.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub roster: RosterConfig,
    pub world: WorldConfig,
}
