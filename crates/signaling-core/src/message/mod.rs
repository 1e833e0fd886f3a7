//! SIP value types consumed by the operation state machines
//!
//! Parsing of full SIP messages and transport framing belong to the
//! transaction layer; these types only carry what the operations read and
//! write: methods, URIs, addresses, identities and header lists.

pub mod address;
pub mod header;
pub mod identity;
pub mod method;
pub mod request;
pub mod response;
pub mod uri;

pub use address::SipAddress;
pub use header::{Header, HeaderName, Headers};
pub use identity::IdentityAddress;
pub use method::Method;
pub use request::Request;
pub use response::{Response, default_reason_phrase};
pub use uri::{Param, Scheme, SipUri};
