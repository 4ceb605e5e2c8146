//! Process-wide logging setup.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber: `RUST_LOG`-driven filtering
/// (default `info`) over a plain fmt layer. Idempotent.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // No ANSI so the structured fields stay parseable in log files.
        let fmt_layer = tracing_subscriber::fmt::layer().with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    });
}
