use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SignalingError;

/// SIP request methods understood by the signaling core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Refer,
    Notify,
    Subscribe,
    Message,
    Info,
    Update,
    Publish,
}

impl Method {
    /// Canonical upper-case token
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Refer => "REFER",
            Method::Notify => "NOTIFY",
            Method::Subscribe => "SUBSCRIBE",
            Method::Message => "MESSAGE",
            Method::Info => "INFO",
            Method::Update => "UPDATE",
            Method::Publish => "PUBLISH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Method tokens are case-sensitive (RFC 3261 7.1)
        match s {
            "INVITE" => Ok(Method::Invite),
            "ACK" => Ok(Method::Ack),
            "BYE" => Ok(Method::Bye),
            "CANCEL" => Ok(Method::Cancel),
            "REGISTER" => Ok(Method::Register),
            "OPTIONS" => Ok(Method::Options),
            "REFER" => Ok(Method::Refer),
            "NOTIFY" => Ok(Method::Notify),
            "SUBSCRIBE" => Ok(Method::Subscribe),
            "MESSAGE" => Ok(Method::Message),
            "INFO" => Ok(Method::Info),
            "UPDATE" => Ok(Method::Update),
            "PUBLISH" => Ok(Method::Publish),
            other => Err(SignalingError::UnknownMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tokens() {
        assert_eq!(Method::Refer.to_string(), "REFER");
        assert_eq!("REFER".parse::<Method>().unwrap(), Method::Refer);
        assert!("refer".parse::<Method>().is_err());
    }
}
