//! Diagnostic logging setup.
//!
//! Logs go to stderr so they never interleave with reply text on stdout.
//! `RUST_LOG` takes precedence over the per-command default filter.

use tracing_subscriber::EnvFilter;

/// Default filter for the relay server.
pub const SERVER_FILTER: &str = "info";
/// Default filter for the terminal front-ends.
pub const CLIENT_FILTER: &str = "warn";

pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
