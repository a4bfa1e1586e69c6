//! # Tracing initialization
//!
//! Single entry point for wiring up `tracing-subscriber`. Kept deliberately
//! small: the binary crate decides *when* to call it, this module decides
//! *how* the subscriber is built.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Honors `RUST_LOG` (defaulting to `info`); emits JSON when `json` is true
/// (production) or human-readable pretty output otherwise (local dev).
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
