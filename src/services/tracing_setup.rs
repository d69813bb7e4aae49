//! Tracing subscriber setup
//!
//! Shared tracing configuration used by the demo binary and tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber writing to `log_file_path`.
///
/// `RUST_LOG` wins over `default_filter` when set. Returns false if the log
/// file could not be created or a global subscriber is already installed.
pub fn init_global(log_file_path: &Path, default_filter: &str) -> bool {
    let Ok(log_file) = File::create(log_file_path) else {
        return false;
    };

    build_subscriber(log_file, default_filter).try_init().is_ok()
}

/// Build the subscriber: env filter plus a plain-text file layer
pub fn build_subscriber(
    log_file: File,
    default_filter: &str,
) -> impl tracing::Subscriber + Send + Sync {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}
