use thiserror::Error;

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by logging, configuration and timer plumbing
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// The logging subsystem could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),

    /// A timer could not be scheduled
    #[error("Timer error: {0}")]
    Timer(String),

    /// Unexpected internal condition
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}
