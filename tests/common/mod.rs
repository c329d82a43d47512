#![allow(dead_code)]

pub mod fixtures;

use std::sync::OnceLock;

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
