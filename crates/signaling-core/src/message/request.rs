use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::header::{Header, HeaderName, Headers};
use super::method::Method;
use super::uri::SipUri;

/// A SIP request as handed to and received from the transaction layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub uri: SipUri,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body
    pub fn new(method: Method, uri: SipUri) -> Self {
        Self { method, uri, headers: Headers::new(), body: Bytes::new() }
    }

    /// Builder-style header append
    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Builder-style body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn add_header(&mut self, name: HeaderName, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &SipUri {
        &self.uri
    }

    /// First value of the named header
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header(&HeaderName::CallId)
    }

    /// Sequence number and method from the CSeq header
    pub fn cseq(&self) -> Option<(u32, Method)> {
        let (seq, method) = self.header(&HeaderName::CSeq)?.trim().split_once(' ')?;
        Some((seq.trim().parse().ok()?, method.trim().parse().ok()?))
    }

    /// `branch` parameter of the top Via
    pub fn branch(&self) -> Option<&str> {
        let via = self.header(&HeaderName::Via)?;
        via.split(';')
            .filter_map(|p| p.trim().split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("branch"))
            .map(|(_, value)| value.split(',').next().unwrap_or(value).trim())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} SIP/2.0\r\n", self.method, self.uri)?;
        for header in self.headers.iter() {
            if !header.name.matches(&HeaderName::ContentLength) {
                write!(f, "{}\r\n", header)?;
            }
        }
        write!(f, "Content-Length: {}\r\n\r\n", self.body.len())?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}
