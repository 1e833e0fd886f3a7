use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::address::SipAddress;
use crate::errors::SignalingError;

/// Who a participant is, stripped of routing details
///
/// Two identities are equal when username, domain and GRUU match; display
/// names, ports and other parameters are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityAddress {
    username: String,
    domain: String,
    gruu: Option<String>,
}

impl IdentityAddress {
    pub fn new(username: impl Into<String>, domain: impl Into<String>) -> Self {
        Self { username: username.into(), domain: domain.into(), gruu: None }
    }

    pub fn with_gruu(mut self, gruu: impl Into<String>) -> Self {
        self.gruu = Some(gruu.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn gruu(&self) -> Option<&str> {
        self.gruu.as_deref()
    }

    /// Same identity without the GRUU (the user rather than one device)
    pub fn without_gruu(&self) -> Self {
        Self::new(self.username.clone(), self.domain.clone())
    }
}

impl From<&SipAddress> for IdentityAddress {
    fn from(address: &SipAddress) -> Self {
        let uri = &address.uri;
        Self {
            username: uri.user.clone().unwrap_or_default(),
            domain: uri.host.clone().unwrap_or_default(),
            gruu: uri.param("gr").and_then(|p| p.value.clone()),
        }
    }
}

impl FromStr for IdentityAddress {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address: SipAddress = s.parse()?;
        Ok(IdentityAddress::from(&address))
    }
}

impl fmt::Display for IdentityAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sip:")?;
        if !self.username.is_empty() {
            write!(f, "{}@", self.username)?;
        }
        f.write_str(&self.domain)?;
        if let Some(gruu) = &self.gruu {
            write!(f, ";gr={}", gruu)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_routing_details() {
        let a: IdentityAddress = "\"Alice\" <sip:alice@example.com:5060;transport=tcp>".parse().unwrap();
        let b: IdentityAddress = "sip:alice@example.com".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "sip:alice@example.com");
    }

    #[test]
    fn test_identity_keeps_gruu() {
        let device: IdentityAddress = "<sip:alice@example.com;gr=urn:uuid:1234>".parse().unwrap();
        assert_eq!(device.gruu(), Some("urn:uuid:1234"));
        assert_ne!(device, device.without_gruu());
        assert_eq!(device.to_string(), "sip:alice@example.com;gr=urn:uuid:1234");
    }
}
