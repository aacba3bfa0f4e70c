//! Diagnostic logging.
//!
//! Demo output goes to stdout through the menu and event sinks; diagnostics go
//! to stderr through `tracing` and stay quiet (`warn`) unless asked for.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "warn";

/// Picks the filter: explicit flag, then `RUST_LOG`, then `DEFAULT_FILTER`.
pub fn filter(explicit: Option<&str>) -> EnvFilter {
    explicit
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Returns `false` if one was already set.
pub fn init(explicit: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(explicit))
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
