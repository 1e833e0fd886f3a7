//! # RVOIP Signaling Core
//!
//! Reference-counted SIP operation state machines.
//!
//! An operation issues requests through a [`TransactionProvider`], receives
//! the transaction layer's events (responses, timeouts, I/O errors, inbound
//! requests) on whatever context the provider delivers them, and reports to
//! the application through a [`SignalingListener`].
//!
//! ## Modules
//!
//! - [`message`]: the SIP value types the operations read and write
//! - [`reason`]: [`Reason`] and the [`ErrorInfo`] record
//! - [`transaction`]: the provider contract and an in-memory provider
//! - [`op`]: the generic [`Operation`] and [`ReferOperation`]
//! - [`root`]: the [`SessionRoot`] shared by all operations
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_signaling_core::{
//!     MemoryTransactionProvider, ReferOperation, SessionRoot, SignalingConfig, SignalingListener,
//!     SipAddress,
//! };
//!
//! struct Accept;
//!
//! impl SignalingListener for Accept {
//!     fn refer_received(&self, operation: &Arc<ReferOperation>, _target: SipAddress) {
//!         let _ = operation.reply(rvoip_signaling_core::Reason::None);
//!     }
//! }
//!
//! let provider = Arc::new(MemoryTransactionProvider::new());
//! let root = SessionRoot::new(SignalingConfig::default(), provider.clone(), Arc::new(Accept));
//!
//! let refer = root.create_refer_operation();
//! refer.set_to("<sip:bob@example.com>".parse().unwrap());
//! refer.send_refer(&"sip:carol@".parse().unwrap()).unwrap();
//!
//! assert_eq!(provider.sent_requests().len(), 1);
//! ```

pub mod config;
pub mod errors;
pub mod message;
pub mod op;
pub mod reason;
pub mod root;
pub mod transaction;

pub use config::SignalingConfig;
pub use errors::{SignalingError, SignalingResult};
pub use message::{HeaderName, IdentityAddress, Method, Request, Response, SipAddress, SipUri};
pub use op::{Direction, Operation, OperationId, OperationRef, OperationState, OperationType, ReferOperation};
pub use reason::{ErrorInfo, Reason};
pub use root::{SessionRoot, SignalingListener};
pub use transaction::{
    IoErrorEvent, MemoryTransactionProvider, RequestEvent, ResponseEvent, ServerTransaction, TimeoutEvent,
    TransactionKey, TransactionProvider, TransactionUser,
};
