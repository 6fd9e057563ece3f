//! Process-wide tracing initialization.
//!
//! One-shot `tracing_subscriber` setup so every stage span the orchestrator
//! opens (see `orchestrator::stage_span`) lands somewhere. Controlled by the
//! standard `RUST_LOG` filter, defaulting to `info` when unset.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a global `fmt` subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
    });
}
