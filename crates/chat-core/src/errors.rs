//! Error types for chat-core

use thiserror::Error;

/// Result type for composing payload handling
pub type ComposingResult<T> = Result<T, ComposingError>;

/// Errors raised while encoding or decoding is-composing payloads
///
/// Inbound payload errors are logged and dropped by the machine; they only
/// surface to callers of the codec functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposingError {
    /// Well-formed XML that is not an is-composing document
    #[error("Malformed is-composing payload: {0}")]
    MalformedPayload(String),

    /// `<state>` holds something other than `active` or `idle`
    #[error("Unknown composing state: {0}")]
    UnknownState(String),

    /// XML reader or writer failure
    #[error("XML error: {0}")]
    Xml(String),
}

impl ComposingError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub fn xml(error: impl ToString) -> Self {
        Self::Xml(error.to_string())
    }
}
