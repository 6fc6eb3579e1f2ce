// src/logging.rs

//! Tracing subscriber setup for embedding applications
//!
//! Honors `RUST_LOG`; defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber for the process
///
/// Returns false when a global subscriber was already installed.
pub fn init_logging() -> bool {
    init_logging_with_default("info")
}

/// Like [`init_logging`] with a different fallback filter
pub fn init_logging_with_default(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init()
        .is_ok()
}
