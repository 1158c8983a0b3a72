//! Tracing Initialization
//!
//! Sets up the `tracing` subscriber with an environment filter. All
//! user-visible behavior of the archiver surfaces through these logs; there
//! is no interactive error surface.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (default: `info` with `bybit_archiver=info`)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bybit_archiver=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
