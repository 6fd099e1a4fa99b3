//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup after the configuration is loaded.
//! `RUST_LOG` wins over the configured level when it parses.

use crate::errors::{AlfredError, Result};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to `log_file` or stderr
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AlfredError::Config(format!("invalid log level '{}': {}", level, e)))?;

    let writer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AlfredError::Config(format!(
                        "failed to open log file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init()
        .map_err(|e| AlfredError::Config(format!("failed to set subscriber: {}", e)))?;

    Ok(())
}

/// Parse a level string, rejecting empty and unknown values
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    if level.is_empty() {
        return Err(AlfredError::Config("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AlfredError::Config(format!("unrecognised log level: '{}'", level)))
}
