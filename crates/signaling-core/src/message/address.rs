use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::uri::{Param, SipUri};
use crate::errors::SignalingError;

/// A name-addr or addr-spec as carried by From, To, Contact and Refer-To
///
/// ```text
/// "Bob" <sip:bob@example.com>;tag=1928301774
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SipAddress {
    pub display_name: Option<String>,
    pub uri: SipUri,
    /// Header parameters following the URI (`tag`, `expires`, ...)
    pub params: Vec<Param>,
}

impl SipAddress {
    /// Wrap a URI without display name or parameters
    pub fn new(uri: SipUri) -> Self {
        Self { display_name: None, uri, params: Vec::new() }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Value of the `tag` parameter
    pub fn tag(&self) -> Option<&str> {
        self.param("tag")
    }

    /// Replace (or add) the `tag` parameter
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.params.retain(|p| !p.name.eq_ignore_ascii_case("tag"));
        self.params.push(Param::new("tag", tag));
        self
    }

    /// Value of a header parameter; flags yield an empty string
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_deref().unwrap_or(""))
    }
}

impl From<SipUri> for SipAddress {
    fn from(uri: SipUri) -> Self {
        Self::new(uri)
    }
}

impl FromStr for SipAddress {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(SignalingError::invalid_address(input, "empty address"));
        }

        match input.find('<') {
            Some(open) => {
                let close = input[open..]
                    .find('>')
                    .map(|i| i + open)
                    .ok_or_else(|| SignalingError::invalid_address(input, "missing '>'"))?;

                let display = input[..open].trim().trim_matches('"').trim();
                let uri = input[open + 1..close].parse::<SipUri>()?;
                let params = Param::parse_list(&input[close + 1..]);

                Ok(SipAddress {
                    display_name: (!display.is_empty()).then(|| display.to_string()),
                    uri,
                    params,
                })
            }
            // addr-spec: anything after the first ';' belongs to the header
            None => {
                let (uri, params) = match input.split_once(';') {
                    Some((uri, params)) => (uri, Param::parse_list(params)),
                    None => (input, Vec::new()),
                };
                Ok(SipAddress { display_name: None, uri: uri.parse()?, params })
            }
        }
    }
}

impl fmt::Display for SipAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name)?;
        }
        write!(f, "<{}>", self.uri)?;
        for param in &self.params {
            write!(f, ";{}", param)?;
        }
        Ok(())
    }
}
