//! Failure reasons and the error record attached to operations
//!
//! [`Reason`] is the protocol-neutral cause of a failure. Its mapping to and
//! from SIP status codes lives in one table, [`Reason::to_sip_code`] and
//! [`Reason::from_sip_code`], used both when a response arrives and when the
//! application replies to an inbound request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::{HeaderName, Response};

/// Why an operation failed or was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    None,
    Declined,
    Busy,
    Redirect,
    TemporarilyUnavailable,
    RequestTimeout,
    NotFound,
    DoNotDisturb,
    UnsupportedContent,
    Forbidden,
    Unknown,
    ServiceUnavailable,
    IoError,
    NotImplemented,
    NotAcceptable,
    RequestPending,
    Unauthorized,
    Gone,
    AddressIncomplete,
    MovedPermanently,
    BadGateway,
    ServerTimeout,
    NoMatch,
}

impl Reason {
    /// SIP status code sent when replying with this reason
    pub fn to_sip_code(self) -> u16 {
        match self {
            Reason::None => 200,
            Reason::Declined => 603,
            Reason::Busy => 486,
            Reason::Redirect => 302,
            Reason::TemporarilyUnavailable => 480,
            Reason::RequestTimeout => 408,
            Reason::NotFound => 404,
            Reason::DoNotDisturb => 600,
            Reason::UnsupportedContent => 415,
            Reason::Forbidden => 403,
            Reason::Unknown => 400,
            Reason::ServiceUnavailable => 503,
            Reason::IoError => 503,
            Reason::NotImplemented => 501,
            Reason::NotAcceptable => 488,
            Reason::RequestPending => 491,
            Reason::Unauthorized => 401,
            Reason::Gone => 410,
            Reason::AddressIncomplete => 484,
            Reason::MovedPermanently => 301,
            Reason::BadGateway => 502,
            Reason::ServerTimeout => 504,
            Reason::NoMatch => 481,
        }
    }

    /// Reason for a received status code
    ///
    /// 503 maps to `ServiceUnavailable`; `IoError` is only ever produced
    /// locally. Codes without a dedicated reason fall back by class.
    pub fn from_sip_code(code: u16) -> Reason {
        match code {
            100..=299 => Reason::None,
            301 => Reason::MovedPermanently,
            302 => Reason::Redirect,
            401 | 407 => Reason::Unauthorized,
            403 => Reason::Forbidden,
            404 => Reason::NotFound,
            408 => Reason::RequestTimeout,
            410 => Reason::Gone,
            415 => Reason::UnsupportedContent,
            480 => Reason::TemporarilyUnavailable,
            481 => Reason::NoMatch,
            484 => Reason::AddressIncomplete,
            486 | 600 => Reason::Busy,
            488 | 606 => Reason::NotAcceptable,
            491 => Reason::RequestPending,
            501 => Reason::NotImplemented,
            502 => Reason::BadGateway,
            503 => Reason::ServiceUnavailable,
            504 => Reason::ServerTimeout,
            603 => Reason::Declined,
            500..=599 => Reason::ServiceUnavailable,
            600..=699 => Reason::Declined,
            _ => Reason::Unknown,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why an operation ended the way it did
///
/// Built whole and replaced whole; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    reason: Reason,
    protocol: String,
    code: u16,
    text: String,
    warning: Option<String>,
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::none()
    }
}

impl ErrorInfo {
    pub fn new(
        reason: Reason,
        protocol: impl Into<String>,
        code: u16,
        text: impl Into<String>,
        warning: Option<String>,
    ) -> Self {
        Self {
            reason,
            protocol: protocol.into(),
            code,
            text: text.into(),
            warning,
        }
    }

    /// The empty record: no failure
    pub fn none() -> Self {
        Self {
            reason: Reason::None,
            protocol: String::new(),
            code: 0,
            text: String::new(),
            warning: None,
        }
    }

    /// Local I/O failure towards the peer
    pub fn io_error() -> Self {
        Self::new(Reason::IoError, "SIP", 503, "IO Error", None)
    }

    /// No final response within the transaction timeout
    pub fn request_timeout() -> Self {
        Self::new(Reason::RequestTimeout, "SIP", 408, "Request timeout", None)
    }

    /// Derive the record from a received response
    ///
    /// Success and provisional responses yield [`ErrorInfo::none`]. For
    /// failures, a `Reason` header (RFC 3326) overrides protocol, code and
    /// text; `Warning` is kept verbatim.
    pub fn from_response(response: &Response) -> Self {
        if response.status() < 300 {
            return Self::none();
        }

        let warning = response.header(&HeaderName::Warning).map(str::to_string);
        let reason = Reason::from_sip_code(response.status());

        if let Some((protocol, cause, text)) = response.header(&HeaderName::Reason).and_then(parse_reason_header) {
            return Self::new(
                reason,
                protocol,
                cause.unwrap_or(response.status()),
                text.unwrap_or_else(|| response.reason_phrase().to_string()),
                warning,
            );
        }

        Self::new(reason, "SIP", response.status(), response.reason_phrase(), warning)
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.reason != Reason::None
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_error() {
            return f.write_str("no error");
        }
        write!(f, "{} ({} {} {})", self.reason, self.protocol, self.code, self.text)?;
        if let Some(warning) = &self.warning {
            write!(f, " warning: {}", warning)?;
        }
        Ok(())
    }
}

/// `Q.850;cause=16;text="Terminated"` -> ("Q.850", Some(16), Some("Terminated"))
fn parse_reason_header(value: &str) -> Option<(String, Option<u16>, Option<String>)> {
    let mut parts = value.split(';');
    let protocol = parts.next()?.trim();
    if protocol.is_empty() {
        return None;
    }

    let mut cause = None;
    let mut text = None;
    for part in parts {
        match part.trim().split_once('=') {
            Some((name, v)) if name.trim().eq_ignore_ascii_case("cause") => cause = v.trim().parse().ok(),
            Some((name, v)) if name.trim().eq_ignore_ascii_case("text") => {
                text = Some(v.trim().trim_matches('"').to_string())
            }
            _ => {}
        }
    }

    Some((protocol.to_string(), cause, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_records() {
        let info = ErrorInfo::io_error();
        assert_eq!(info.reason(), Reason::IoError);
        assert_eq!((info.protocol(), info.code(), info.text()), ("SIP", 503, "IO Error"));

        let info = ErrorInfo::request_timeout();
        assert_eq!(info.reason(), Reason::RequestTimeout);
        assert_eq!((info.protocol(), info.code(), info.text()), ("SIP", 408, "Request timeout"));
    }

    #[test]
    fn test_reason_code_mapping() {
        assert_eq!(Reason::Unknown.to_sip_code(), 400);
        assert_eq!(Reason::RequestTimeout.to_sip_code(), 408);
        assert_eq!(Reason::IoError.to_sip_code(), 503);
        assert_eq!(Reason::from_sip_code(404), Reason::NotFound);
        assert_eq!(Reason::from_sip_code(499), Reason::Unknown);
        assert_eq!(Reason::from_sip_code(580), Reason::ServiceUnavailable);
        assert_eq!(Reason::from_sip_code(699), Reason::Declined);
    }

    #[test]
    fn test_from_response_with_warning() {
        let response = Response::new(486).with_header(HeaderName::Warning, "399 pbx \"line busy\"");
        let info = ErrorInfo::from_response(&response);
        assert_eq!(info.reason(), Reason::Busy);
        assert_eq!(info.code(), 486);
        assert_eq!(info.text(), "Busy Here");
        assert_eq!(info.warning(), Some("399 pbx \"line busy\""));
    }

    #[test]
    fn test_from_response_reason_header_overrides() {
        let response = Response::new(603)
            .with_header(HeaderName::Reason, "Q.850;cause=21;text=\"Call rejected\"");
        let info = ErrorInfo::from_response(&response);
        assert_eq!(info.reason(), Reason::Declined);
        assert_eq!(info.protocol(), "Q.850");
        assert_eq!(info.code(), 21);
        assert_eq!(info.text(), "Call rejected");
    }

    #[test]
    fn test_success_clears_record() {
        assert_eq!(ErrorInfo::from_response(&Response::new(202)), ErrorInfo::none());
        assert_eq!(ErrorInfo::none().to_string(), "no error");
    }
}
