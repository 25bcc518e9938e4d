//! Structured JSON logging to stdout.
//!
//! One JSON object per line per event, with timestamp, level, message, and
//! whatever fields the event carries. The filter comes from `RUST_LOG`,
//! defaulting to `info`. Initialized exactly once at process start.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
