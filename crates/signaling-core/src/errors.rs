//! Error types for signaling-core
//!
//! These errors are returned synchronously to the caller of an operation
//! method. Transport failures arriving through callbacks never surface here;
//! they end up in the operation's [`ErrorInfo`](crate::ErrorInfo).

use thiserror::Error;

/// Result type for signaling operations
pub type SignalingResult<T> = Result<T, SignalingError>;

/// Errors raised by operations, the session root and the transaction layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// No destination could be resolved for an outgoing request
    #[error("No resolvable destination for {operation}")]
    NoDestination { operation: String },

    /// `reply()` called without a pending server transaction
    #[error("No pending server transaction for {operation}")]
    NoPendingTransaction { operation: String },

    /// A URI or address could not be parsed
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// A method token is not a known SIP method
    #[error("Unknown SIP method: {0}")]
    UnknownMethod(String),

    /// The transaction layer refused a request or response
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Operation is not in a state that allows the call
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl SignalingError {
    /// Create a missing-destination error
    pub fn no_destination(operation: impl ToString) -> Self {
        Self::NoDestination { operation: operation.to_string() }
    }

    /// Create a missing-server-transaction error
    pub fn no_pending_transaction(operation: impl ToString) -> Self {
        Self::NoPendingTransaction { operation: operation.to_string() }
    }

    /// Create an address parsing error
    pub fn invalid_address(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress { input: input.to_string(), reason: reason.into() }
    }

    /// Create a transaction layer error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction { message: message.into() }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Whether this error reports a call made out of sequence rather than a failure
    pub fn is_sequence_error(&self) -> bool {
        matches!(self, Self::NoPendingTransaction { .. } | Self::InvalidState { .. })
    }
}
