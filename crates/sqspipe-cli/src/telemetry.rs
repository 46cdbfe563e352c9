//! Logging setup.
//!
//! stdout carries message bodies, so every log line goes to stderr. The
//! filter comes from `RUST_LOG` and defaults to `warn`.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
