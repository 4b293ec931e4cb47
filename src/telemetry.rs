//! Structured logging setup, using only the console `fmt` layer: this is a
//! CLI batch dispatcher, not a long-lived server process, so there's no
//! span tree worth exporting to an OTel collector.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the tracing subscriber. Respects `RUST_LOG` if set, falling
/// back to `log_level`, which is driven by `-q`/`-v`/`--debug`.
pub fn init_telemetry(log_level: Level) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    Ok(())
}
