//! Composing indication configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timer durations of the composing machine, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposingConfig {
    /// Local silence before we announce `idle`
    pub idle_timeout_secs: u64,

    /// Interval at which `active` is re-announced while typing
    pub refresh_timeout_secs: u64,

    /// How long a peer's `active` is trusted without a refresh
    pub remote_refresh_timeout_secs: u64,
}

impl Default for ComposingConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 15,
            refresh_timeout_secs: 60,
            remote_refresh_timeout_secs: 120,
        }
    }
}

impl ComposingConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn remote_refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_refresh_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ComposingConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(15));
        assert_eq!(config.refresh_timeout(), Duration::from_secs(60));
        assert_eq!(config.remote_refresh_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_override_from_toml() {
        let config: ComposingConfig = rvoip_infra_common::load_config_str("idle_timeout_secs = 5").unwrap();
        assert_eq!(config.idle_timeout_secs, 5);
        assert_eq!(config.refresh_timeout_secs, 60);
    }
}
