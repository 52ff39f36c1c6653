//! Tracing subscriber setup for binaries and demos

use tracing_subscriber::EnvFilter;

/// Install a JSON log subscriber filtered by `RUST_LOG`, `info` by default.
///
/// Calling it again is a no-op.
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`] with another fallback filter directive
pub fn init_with_default(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
