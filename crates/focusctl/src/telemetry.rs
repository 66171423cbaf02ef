//! Subscriber setup for focusctl.
//!
//! Logs go to stderr so command output on stdout stays clean.

use anyhow::{Context, Result};
use focusconf::{LogFormat, TelemetryConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `level` overrides the configured filter.
pub fn init(config: &TelemetryConfig, level: Option<&str>, color: bool) -> Result<()> {
    let directive = level.unwrap_or(&config.log_level);
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log filter {directive:?}"))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(color)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")
}
