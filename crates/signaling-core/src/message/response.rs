use std::fmt;

use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::address::SipAddress;
use super::header::{Header, HeaderName, Headers};
use super::request::Request;

/// Standard reason phrase for a status code
pub fn default_reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Trying",
        180 => "Ringing",
        183 => "Session Progress",
        200 => "OK",
        202 => "Accepted",
        301 => "Moved Permanently",
        302 => "Moved Temporarily",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        410 => "Gone",
        415 => "Unsupported Media Type",
        480 => "Temporarily Unavailable",
        481 => "Call/Transaction Does Not Exist",
        484 => "Address Incomplete",
        486 => "Busy Here",
        488 => "Not Acceptable Here",
        489 => "Bad Event",
        491 => "Request Pending",
        500 => "Server Internal Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Server Time-out",
        600 => "Busy Everywhere",
        603 => "Decline",
        _ => match code / 100 {
            1 => "Provisional",
            2 => "Success",
            3 => "Redirection",
            4 => "Client Error",
            5 => "Server Error",
            _ => "Global Failure",
        },
    }
}

/// A SIP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub reason_phrase: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    /// Create a bare response with the standard reason phrase
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason_phrase: default_reason_phrase(status).to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Build a response to `request` (RFC 3261 8.2.6.2)
    ///
    /// Copies Via, From, To, Call-ID and CSeq. A To tag is added to final
    /// responses when the request had none.
    pub fn from_request(request: &Request, status: u16) -> Self {
        let mut response = Self::new(status);

        for via in request.headers.get_all(&HeaderName::Via) {
            response.headers.push(Header::new(HeaderName::Via, via));
        }
        for name in [HeaderName::From, HeaderName::To, HeaderName::CallId, HeaderName::CSeq] {
            if let Some(value) = request.header(&name) {
                let value = if name == HeaderName::To && status > 100 {
                    ensure_to_tag(value)
                } else {
                    value.to_string()
                };
                response.headers.push(Header::new(name, value));
            }
        }

        response
    }

    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_reason_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.reason_phrase = phrase.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name)
    }

    /// 2xx-6xx
    pub fn is_final(&self) -> bool {
        self.status >= 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn ensure_to_tag(value: &str) -> String {
    match value.parse::<SipAddress>() {
        Ok(address) if address.tag().is_none() => {
            let tag = format!("{:08x}", rand::thread_rng().next_u32());
            address.with_tag(tag).to_string()
        }
        _ => value.to_string(),
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0 {} {}\r\n", self.status, self.reason_phrase)?;
        for header in self.headers.iter() {
            if !header.name.matches(&HeaderName::ContentLength) {
                write!(f, "{}\r\n", header)?;
            }
        }
        write!(f, "Content-Length: {}\r\n\r\n", self.body.len())?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Method;

    #[test]
    fn test_from_request_copies_dialog_headers() {
        let request = Request::new(Method::Refer, "sip:bob@example.com".parse().unwrap())
            .with_header(HeaderName::Via, "SIP/2.0/UDP a;branch=z9hG4bK1")
            .with_header(HeaderName::Via, "SIP/2.0/UDP b;branch=z9hG4bK2")
            .with_header(HeaderName::From, "<sip:alice@example.com>;tag=111")
            .with_header(HeaderName::To, "<sip:bob@example.com>")
            .with_header(HeaderName::CallId, "call-1")
            .with_header(HeaderName::CSeq, "1 REFER");

        let response = Response::from_request(&request, 400);
        assert_eq!(response.reason_phrase(), "Bad Request");
        assert_eq!(response.headers.get_all(&HeaderName::Via).count(), 2);
        assert_eq!(response.header(&HeaderName::CSeq), Some("1 REFER"));

        let to: SipAddress = response.header(&HeaderName::To).unwrap().parse().unwrap();
        assert!(to.tag().is_some());
    }

    #[test]
    fn test_status_classes() {
        assert!(Response::new(202).is_success());
        assert!(!Response::new(180).is_final());
        assert!(Response::new(408).is_final());
        assert_eq!(default_reason_phrase(499), "Client Error");
    }
}
