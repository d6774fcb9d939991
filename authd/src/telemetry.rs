//! Tracing subscriber initialization.
//!
//! The subscriber is installed once by the binary. Library code only emits `tracing` events
//! and spans; with no subscriber installed (as in most tests) they are dropped.
//!
//! Levels come from `RUST_LOG` and default to `info`:
//!
//! ```bash
//! RUST_LOG=authd=debug,tower_http=debug,sqlx=warn
//! ```
//!
//! The output format is chosen by `logging.format` in the configuration: human-readable
//! `text` or one JSON object per line (`json`) for log shippers.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Initialize tracing with the configured output format.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init()?,
    }

    info!(?format, "Telemetry initialized");
    Ok(())
}
