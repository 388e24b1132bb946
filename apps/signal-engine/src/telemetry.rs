//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Initialize console tracing with `RUST_LOG` filtering (default `info`).
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
