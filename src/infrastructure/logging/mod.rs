//! Tracing initialization.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::domain::models::config::LoggingConfig;

/// Initialize the global tracing subscriber from config.
///
/// `RUST_LOG` still wins over the configured level so operators can turn
/// up verbosity per-module without touching the config file.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            config
                .level
                .parse()
                .with_context(|| format!("invalid log level {:?}", config.level))?,
        )
        .from_env_lossy();

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.format == "json" {
        builder.json().try_init().ok();
    } else {
        builder.try_init().ok();
    }
    Ok(())
}
