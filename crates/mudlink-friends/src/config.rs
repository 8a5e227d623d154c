/// Where the roster keeps its two documents.
///
/// Friends and banned peers live under separate keys so a corrupt
/// document on one side never blocks loading the other.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub friends_key: String,
    pub banned_key: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            friends_key: "roster/friends".to_string(),
            banned_key: "roster/banned".to_string(),
        }
    }
}
