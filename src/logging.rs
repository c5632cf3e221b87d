//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file output.
//! Integrates with the tracing ecosystem for structured event logging.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level
/// applies to this crate only.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(format!(
            "studydash={}",
            config.level.to_lowercase()
        ))?),
    }
}

/// Initialize logging based on configuration.
///
/// Sets up structured logging with support for both JSON and human-readable formats,
/// with optional file output in addition to STDERR.
///
/// # Errors
///
/// Returns error if the level is not a valid filter directive or the log file
/// cannot be opened
///
/// # Examples
///
/// ```no_run
/// use studydash::config::LoggingConfig;
/// use studydash::logging::init_logging;
///
/// let config = LoggingConfig::default();
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);

        if let Some(file) = file {
            let file_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(file);
            registry.with(stderr_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stderr_layer).try_init()?;
        }
    } else {
        let stderr_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        if let Some(file) = file {
            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(file);
            registry.with(stderr_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stderr_layer).try_init()?;
        }
    }

    Ok(())
}
