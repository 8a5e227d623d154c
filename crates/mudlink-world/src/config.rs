/// Storage layout for world documents.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Every world keeps its documents under `<key_prefix>/<world id>/`.
    pub key_prefix: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            key_prefix: "worlds".to_string(),
        }
    }
}
