//! Tracing initialization for stemchart.
//!
//! Logs go to stderr so stdout stays free for session feedback.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise `level` (e.g. `info` or
/// `warn,stemchart=debug`).
pub fn filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level directive: {level}")),
    }
}

/// Install the global subscriber
pub fn init(level: &str) -> Result<()> {
    let env_filter = filter(level)?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .context("tracing subscriber already installed")?;

    tracing::debug!(level, "tracing initialized");
    Ok(())
}
