//! Log output setup.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG`, falling back
/// to `info`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() {
    init_with_default("info");
}

/// Like [`init`], with a custom fallback filter such as
/// `"info,mudlink_session=debug"`.
pub fn init_with_default(directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}
