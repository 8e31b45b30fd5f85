//! Tracing subscriber setup
//!
//! Shared tracing configuration used by the `tvp-dump` binary and by tests
//! that want to inspect what the tree engine logged.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber, logging to the given file.
///
/// Filtering comes from `RUST_LOG` with a DEBUG default.
pub fn init_global(log_file_path: &Path) -> io::Result<()> {
    let log_file = File::create(log_file_path)?;

    build_subscriber(log_file)
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Build a subscriber writing formatted events to `log_file`.
pub fn build_subscriber(log_file: File) -> impl tracing::Subscriber + Send + Sync {
    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into());

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
}
