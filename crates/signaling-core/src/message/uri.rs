use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SignalingError;

/// URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }
}

/// A `name[=value]` parameter, used by URIs and header addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
}

impl Param {
    /// Create a valued parameter
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: Some(value.into()) }
    }

    /// Create a flag parameter (no value)
    pub fn flag(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None }
    }

    pub(crate) fn parse_list(input: &str) -> Vec<Param> {
        input
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((name, value)) => Param::new(name.trim(), value.trim()),
                None => Param::flag(p),
            })
            .collect()
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// A SIP or SIPS URI
///
/// The host is optional so that a destination typed without one can be
/// carried around and completed just before a request is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SipUri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub params: Vec<Param>,
    /// Raw `?header=value` part, kept verbatim (e.g. `Replaces=...` in a Refer-To)
    pub headers: Option<String>,
}

impl SipUri {
    /// Create `sip:user@host`
    pub fn new(user: Option<&str>, host: Option<&str>) -> Self {
        Self {
            scheme: Scheme::Sip,
            user: user.map(str::to_string),
            host: host.map(str::to_string),
            port: None,
            params: Vec::new(),
            headers: None,
        }
    }

    /// Whether a host part is present
    pub fn has_host(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Look up a URI parameter by name (case-insensitive)
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

fn strip_scheme(input: &str) -> Option<(Scheme, &str)> {
    for (prefix, scheme) in [("sips:", Scheme::Sips), ("sip:", Scheme::Sip)] {
        if input.get(..prefix.len()).is_some_and(|p| p.eq_ignore_ascii_case(prefix)) {
            return Some((scheme, &input[prefix.len()..]));
        }
    }
    None
}

fn parse_host_port(input: &str, original: &str) -> Result<(Option<String>, Option<u16>), SignalingError> {
    if input.is_empty() {
        return Ok((None, None));
    }

    let (host, port) = if let Some(v6) = input.strip_prefix('[') {
        let (host, after) = v6
            .split_once(']')
            .ok_or_else(|| SignalingError::invalid_address(original, "unterminated IPv6 reference"))?;
        (host, after.strip_prefix(':'))
    } else {
        match input.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (input, None),
        }
    };

    let port = port
        .map(|p| p.parse::<u16>().map_err(|_| SignalingError::invalid_address(original, "invalid port")))
        .transpose()?;

    Ok((Some(host.to_string()), port))
}

impl FromStr for SipUri {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let (scheme, rest) = strip_scheme(input)
            .ok_or_else(|| SignalingError::invalid_address(input, "expected sip: or sips: scheme"))?;

        let (rest, headers) = match rest.split_once('?') {
            Some((rest, headers)) => (rest, Some(headers.to_string())),
            None => (rest, None),
        };

        let (user, remainder) = match rest.split_once('@') {
            Some((user, remainder)) => {
                if user.is_empty() {
                    return Err(SignalingError::invalid_address(input, "empty user part"));
                }
                (Some(user.to_string()), remainder)
            }
            None => (None, rest),
        };

        let (host_port, params) = match remainder.split_once(';') {
            Some((host_port, params)) => (host_port, Param::parse_list(params)),
            None => (remainder, Vec::new()),
        };

        let (host, port) = parse_host_port(host_port.trim(), input)?;
        if user.is_none() && host.is_none() {
            return Err(SignalingError::invalid_address(input, "missing host"));
        }

        Ok(SipUri { scheme, user, host, port, params, headers })
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme.as_str())?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        if let Some(host) = &self.host {
            if host.contains(':') {
                write!(f, "[{}]", host)?;
            } else {
                f.write_str(host)?;
            }
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        for param in &self.params {
            write!(f, ";{}", param)?;
        }
        if let Some(headers) = &self.headers {
            write!(f, "?{}", headers)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_uri() {
        let uri: SipUri = "sip:bob@example.com:5070;transport=tcp;lr".parse().unwrap();
        assert_eq!(uri.user.as_deref(), Some("bob"));
        assert_eq!(uri.host.as_deref(), Some("example.com"));
        assert_eq!(uri.port, Some(5070));
        assert_eq!(uri.param("transport").and_then(|p| p.value.as_deref()), Some("tcp"));
        assert_eq!(uri.param("lr"), Some(&Param::flag("lr")));
        assert_eq!(uri.to_string(), "sip:bob@example.com:5070;transport=tcp;lr");
    }

    #[test]
    fn test_parse_uri_without_host() {
        let uri: SipUri = "sip:charlie@".parse().unwrap();
        assert_eq!(uri.user.as_deref(), Some("charlie"));
        assert!(!uri.has_host());
    }

    #[test]
    fn test_parse_ipv6_and_headers() {
        let uri: SipUri = "sips:alice@[2001:db8::1]:5061?Replaces=abc%40host".parse().unwrap();
        assert_eq!(uri.scheme, Scheme::Sips);
        assert_eq!(uri.host.as_deref(), Some("2001:db8::1"));
        assert_eq!(uri.port, Some(5061));
        assert_eq!(uri.headers.as_deref(), Some("Replaces=abc%40host"));
        assert_eq!(uri.to_string(), "sips:alice@[2001:db8::1]:5061?Replaces=abc%40host");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("tel:+123".parse::<SipUri>().is_err());
        assert!("sip:".parse::<SipUri>().is_err());
        assert!("sip:@host".parse::<SipUri>().is_err());
        assert!("sip:bob@host:notaport".parse::<SipUri>().is_err());
    }

    #[test]
    fn test_non_ascii_scheme_is_an_error() {
        assert!("abcé@x".parse::<SipUri>().is_err());
        assert!("sipé:bob@x".parse::<SipUri>().is_err());
        assert!("é".parse::<SipUri>().is_err());
    }
}
