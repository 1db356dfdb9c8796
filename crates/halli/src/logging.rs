//! Logging setup for the server binary.

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber. `RUST_LOG` wins when set;
/// otherwise everything at `info` and above is shown.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
