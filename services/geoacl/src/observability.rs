//! Logging setup for the geoacl host.
//!
//! # Purpose
//! Installs a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
//! Output goes to stderr so query results on stdout stay machine-readable.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
//! Library crates record `metrics` counters and gauges; no exporter is
//! installed here, so they are no-ops unless a host embeds a recorder.
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static OBS_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(service_name: &str) {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
    tracing::debug!(service = service_name, "observability initialized");
}
