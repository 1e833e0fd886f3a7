//! Configuration loading
//!
//! Every component configuration in the workspace is a plain `serde` struct
//! with `#[serde(default)]`. This module turns a TOML file (optionally
//! overridden by `RVOIP__`-prefixed environment variables) or a TOML string
//! into such a struct.
//!
//! ```text
//! [signaling]
//! local_domain = "example.org"
//!
//! [composing]
//! idle_timeout_secs = 10
//! ```
//!
//! `RVOIP__COMPOSING__IDLE_TIMEOUT_SECS=5` overrides the file value.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::Result;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RVOIP";

/// Load `T` from a TOML file layered with environment overrides
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());

    let settings = config::Config::builder()
        .add_source(config::File::from(path).required(true))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

/// Load `T` from an in-memory TOML document
pub fn load_config_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}
