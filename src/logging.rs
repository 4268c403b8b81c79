//! Subscriber setup for hosts that want the crate's diagnostics on stderr

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::LocalTime;

use crate::config::{LoggingConfig, DEFAULT_TIME_FORMAT};

/// Builds a formatted subscriber from logging configuration
///
/// Verbose logging raises the level to DEBUG, which shows every applied
/// directive and mixin. An unparsable time format falls back to RFC 3339
/// timestamps with a note on stderr, since no subscriber exists yet to report it.
pub fn create_subscriber(config: &LoggingConfig) -> Box<dyn tracing::Subscriber + Send + Sync> {
    let level = if config.verbose.unwrap_or(false) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let time_format = config
        .time_format
        .clone()
        .unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_string());

    match time::format_description::parse_owned::<2>(&time_format) {
        Ok(format_desc) => Box::new(
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .with_timer(LocalTime::new(format_desc))
                .finish(),
        ),
        Err(_) => {
            eprintln!("Custom time format '{time_format}' not supported. Using RFC 3339.");
            Box::new(
                tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_writer(std::io::stderr)
                    .with_timer(LocalTime::rfc_3339())
                    .finish(),
            )
        }
    }
}

/// Installs the configured subscriber as the global default
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    tracing::subscriber::set_global_default(create_subscriber(config))
        .context("Failed to install global tracing subscriber")
}
