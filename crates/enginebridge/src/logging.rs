//! Tracing setup for binaries and tests that embed the bridge.

use std::io::IsTerminal;
use std::io::stderr;

use tracing_subscriber::EnvFilter;

/// Variable holding the filter directives, e.g. `enginebridge=debug`.
pub const LOG_ENV: &str = "ENGINE_BRIDGE_LOG";

/// Builds the filter from `ENGINE_BRIDGE_LOG`, then `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    for var in [LOG_ENV, EnvFilter::DEFAULT_ENV] {
        if let Ok(filter) = EnvFilter::try_from_env(var) {
            return filter;
        }
    }
    EnvFilter::new("info")
}

/// Installs a `fmt` subscriber on stderr.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(stderr().is_terminal())
        .with_writer(stderr)
        .try_init();
}
