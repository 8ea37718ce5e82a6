//! Tracing setup for Dashcam binaries.
//!
//! `RUST_LOG` wins over the configured level. A level string that does not
//! parse falls back to `info` rather than failing startup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const FALLBACK_LEVEL: &str = "info";

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if config.json {
        builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init()
            .is_ok()
    } else {
        builder.compact().with_target(true).try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    }
    installed
}

fn configured_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}
