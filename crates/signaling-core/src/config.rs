//! Signaling configuration

use serde::{Deserialize, Serialize};

/// Settings shared by every operation created from one session root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Value of the User-Agent header on outgoing requests
    pub user_agent: String,

    /// Local host name; used in Via and to complete URIs that lack a host
    pub local_domain: String,

    /// Max-Forwards on outgoing requests
    pub max_forwards: u8,

    /// Default From address when an operation has none
    pub identity: Option<String>,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("rvoip-signaling/{}", env!("CARGO_PKG_VERSION")),
            local_domain: "localhost".to_string(),
            max_forwards: 70,
            identity: None,
        }
    }
}

impl SignalingConfig {
    /// Set the local domain
    pub fn with_local_domain(mut self, domain: impl Into<String>) -> Self {
        self.local_domain = domain.into();
        self
    }

    /// Set the default identity
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set the User-Agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SignalingConfig =
            rvoip_infra_common::load_config_str("local_domain = \"example.org\"").unwrap();
        assert_eq!(config.local_domain, "example.org");
        assert_eq!(config.max_forwards, 70);
        assert!(config.identity.is_none());
    }
}
