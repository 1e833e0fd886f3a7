//! Transaction layer contract
//!
//! The transaction layer (matching, retransmission, transport) lives outside
//! this crate. Operations talk to it through [`TransactionProvider`] and
//! receive its events through [`TransactionUser`].
//!
//! ## Reference handling
//!
//! A provider stores an `Arc<dyn TransactionUser>` for every transaction
//! that will produce events for an operation:
//!
//! ```text
//! send_request(req, op)          provider holds op ──► until final response,
//!                                                      timeout or I/O error
//! set_application_data(tx, op)   provider holds op ──► until a final response
//!                                                      is sent on tx, or tx
//!                                                      terminates without one
//! ```
//!
//! A server transaction that terminates without a final response delivers a
//! timeout carrying its server key to the parked operation before releasing
//! it. The operation holds its session root, which holds the provider, so
//! this release is what breaks the cycle for requests never answered.
//!
//! Event delivery hands the stored `Arc` to the handler (`self: Arc<Self>`),
//! so an operation can never be freed while one of its callbacks runs, and a
//! dropped application handle does not cancel an in-flight exchange.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::SignalingResult;
use crate::message::{Method, Request, Response};

pub use memory::MemoryTransactionProvider;

/// Identifies one client or server transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionKey {
    branch: String,
    method: Method,
    is_server: bool,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, method: Method, is_server: bool) -> Self {
        Self { branch: branch.into(), method, is_server }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.is_server { "server" } else { "client" };
        write!(f, "{}:{}:{}", self.branch, self.method, side)
    }
}

/// Handle to a server transaction awaiting a response
///
/// Carries the request it was created from, so a response can be built
/// without going back to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTransaction {
    key: TransactionKey,
    request: Request,
}

impl ServerTransaction {
    pub fn new(key: TransactionKey, request: Request) -> Self {
        Self { key, request }
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// A response arrived on a client transaction
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub key: TransactionKey,
    pub response: Response,
}

/// A client transaction timed out (Timer B / Timer F)
#[derive(Debug, Clone)]
pub struct TimeoutEvent {
    pub key: TransactionKey,
}

/// The transport failed while sending on a transaction
#[derive(Debug, Clone)]
pub struct IoErrorEvent {
    pub key: Option<TransactionKey>,
    pub message: String,
}

/// A new request arrived outside any existing transaction
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub request: Request,
}

/// Receiver of transaction events
///
/// The provider invokes these on its delivery context, serialized per user.
/// Handlers report inward (state, error info, logs) and never return errors.
pub trait TransactionUser: Send + Sync {
    fn process_io_error(self: Arc<Self>, event: IoErrorEvent);

    fn process_timeout(self: Arc<Self>, event: TimeoutEvent);

    fn process_response_event(self: Arc<Self>, event: ResponseEvent);

    fn process_request_event(self: Arc<Self>, event: RequestEvent);
}

/// Creates transactions and carries messages for the operations
pub trait TransactionProvider: Send + Sync {
    /// Start a client transaction; events for it go to `user`
    ///
    /// Returns without waiting for any response.
    fn send_request(&self, request: Request, user: Arc<dyn TransactionUser>) -> SignalingResult<TransactionKey>;

    /// Create the server transaction for an inbound request
    fn create_server_transaction(&self, request: &Request) -> SignalingResult<ServerTransaction>;

    /// Attach the operation owning a server transaction
    ///
    /// The provider keeps `user` alive until a final response is sent, or
    /// until the transaction terminates, in which case `user` first gets
    /// [`TransactionUser::process_timeout`] with the server key.
    fn set_application_data(&self, transaction: &ServerTransaction, user: Arc<dyn TransactionUser>);

    /// Send a response on a server transaction
    fn send_response(&self, transaction: &ServerTransaction, response: Response) -> SignalingResult<()>;
}
