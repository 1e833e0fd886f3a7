use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::{Error, Result};

/// Configuration for the logging system
///
/// Deserializable so it can live in the `[logging]` table of an engine
/// configuration file next to the signaling and composing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`); `RUST_LOG` still wins
    pub level: String,
    /// Emit JSON lines instead of the human readable format
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    /// Log span enter/exit events
    pub log_spans: bool,
    /// Application name used by [`log_welcome`]
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "rvoip-signaling".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level: level.to_string().to_lowercase(),
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Install the global `tracing` subscriber described by `config`.
///
/// Fails with [`Error::Logging`] if the level is invalid or a global
/// subscriber is already installed.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::from_level(level).into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::Logging(e.to_string()))
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level)
        .map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(matches!(parse_log_level("loud"), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_builders() {
        let config = LoggingConfig::new(Level::DEBUG, "composer").with_json().with_spans();
        assert_eq!(config.level, "debug");
        assert_eq!(config.app_name, "composer");
        assert!(config.json);
        assert!(config.log_spans);
        assert!(!config.file_info);
    }

    #[test]
    fn test_invalid_level_is_rejected_before_install() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(setup_logging(&config).is_err());
    }
}
