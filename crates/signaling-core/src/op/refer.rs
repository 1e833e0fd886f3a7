//! REFER operation (call transfer, RFC 3515)
//!
//! Outgoing: [`ReferOperation::send_refer`] builds and dispatches a REFER
//! whose Refer-To names the transfer target.
//!
//! Incoming: the session root hands the request to a fresh operation, which
//! opens a server transaction, parks the operation on it and asks the
//! application through [`SignalingListener::refer_received`]. The
//! application answers with [`ReferOperation::reply`], during the callback
//! or later.
//!
//! [`SignalingListener::refer_received`]: crate::root::SignalingListener::refer_received

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{Direction, Operation, OperationType};
use crate::errors::{SignalingError, SignalingResult};
use crate::message::{HeaderName, Method, Response, SipAddress};
use crate::reason::Reason;
use crate::root::SessionRoot;
use crate::transaction::{
    IoErrorEvent, RequestEvent, ResponseEvent, ServerTransaction, TimeoutEvent, TransactionKey, TransactionUser,
};

/// A REFER exchange, in either direction
pub struct ReferOperation {
    op: Operation,

    /// Server transaction of the inbound REFER, until the reply is sent
    pending_server_transaction: Mutex<Option<ServerTransaction>>,
}

impl ReferOperation {
    /// Create a REFER operation in the `Early` state
    pub fn new(root: Arc<SessionRoot>) -> Arc<Self> {
        Arc::new(Self {
            op: Operation::new(root, OperationType::Refer),
            pending_server_transaction: Mutex::new(None),
        })
    }

    /// Send a REFER asking the peer to contact `destination`
    ///
    /// A destination without host is completed with the local domain. The
    /// operation's contact, when set, is attached as Contact.
    pub fn send_refer(self: &Arc<Self>, destination: &SipAddress) -> SignalingResult<TransactionKey> {
        self.op.set_direction(Direction::Outgoing);

        let mut request = self.op.build_request(Method::Refer).ok_or_else(|| {
            warn!("{}: cannot send REFER without a destination", self.op);
            SignalingError::no_destination(&self.op)
        })?;

        if let Some(contact) = self.op.contact() {
            request.add_header(HeaderName::Contact, contact.to_string());
        }

        let mut target = destination.clone();
        if !target.uri.has_host() {
            let domain = &self.op.root().config().local_domain;
            debug!("{}: completing Refer-To host with {}", self.op, domain);
            target.uri.host = Some(domain.clone());
        }
        request.add_header(HeaderName::ReferTo, target.to_string());

        info!("{}: sending REFER to {}", self.op, target);
        self.op.send_request(request, self.clone())
    }

    /// Answer the pending inbound REFER with the status code for `reason`
    ///
    /// Fails with [`SignalingError::NoPendingTransaction`] when no inbound
    /// REFER is waiting, including when a reply was already sent.
    pub fn reply(&self, reason: Reason) -> SignalingResult<()> {
        let Some(transaction) = self.pending_server_transaction.lock().take() else {
            error!("{}: reply({}) without a pending server transaction", self.op, reason);
            return Err(SignalingError::no_pending_transaction(&self.op));
        };

        let code = reason.to_sip_code();
        let response = Response::from_request(transaction.request(), code);
        info!("{}: replying {} {}", self.op, code, response.reason_phrase());

        let sent = self.op.root().provider().send_response(&transaction, response);
        self.op.process_error();
        sent.map_err(|e| {
            warn!("{}: failed to send reply: {}", self.op, e);
            e
        })
    }

    /// Whether an inbound REFER is waiting for `reply`
    pub fn has_pending_transaction(&self) -> bool {
        self.pending_server_transaction.lock().is_some()
    }
}

impl Deref for ReferOperation {
    type Target = Operation;

    fn deref(&self) -> &Operation {
        &self.op
    }
}

impl AsRef<Operation> for ReferOperation {
    fn as_ref(&self) -> &Operation {
        &self.op
    }
}

impl std::fmt::Display for ReferOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.op, f)
    }
}

impl std::fmt::Debug for ReferOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferOperation")
            .field("op", &self.op)
            .field("pending_reply", &self.has_pending_transaction())
            .finish()
    }
}

impl TransactionUser for ReferOperation {
    fn process_io_error(self: Arc<Self>, event: IoErrorEvent) {
        self.op.handle_io_error(event);
    }

    fn process_timeout(self: Arc<Self>, event: TimeoutEvent) {
        if event.key.is_server() {
            let mut pending = self.pending_server_transaction.lock();
            if pending.as_ref().is_some_and(|tx| tx.key() == &event.key) {
                warn!("{}: inbound REFER was never answered", self.op);
                *pending = None;
            }
        }
        self.op.handle_timeout(event);
    }

    fn process_response_event(self: Arc<Self>, event: ResponseEvent) {
        self.op.handle_response(event);
    }

    /// Inbound REFER
    ///
    /// `self` is the handler's own reference and is released on return; the
    /// one given to the server transaction keeps the operation alive until
    /// the reply is sent.
    fn process_request_event(self: Arc<Self>, event: RequestEvent) {
        let request = event.request;

        if self.op.is_terminated() {
            debug!("{}: ignoring {}, already terminated", self.op, request.method());
            return;
        }
        if request.method() != Method::Refer {
            warn!("{}: unexpected {} request", self.op, request.method());
            return;
        }
        if self.has_pending_transaction() {
            warn!("{}: REFER already pending, ignoring another one", self.op);
            return;
        }

        let provider = self.op.root().provider();
        let transaction = match provider.create_server_transaction(&request) {
            Ok(transaction) => transaction,
            Err(e) => {
                warn!("{}: cannot create server transaction: {}", self.op, e);
                return;
            }
        };
        provider.set_application_data(&transaction, self.clone());
        *self.pending_server_transaction.lock() = Some(transaction);
        self.op.bind_inbound_request(&request);

        let target = match request.header(&HeaderName::ReferTo) {
            Some(value) => value.parse::<SipAddress>(),
            None => {
                warn!("{}: REFER without Refer-To, rejecting", self.op);
                if let Err(e) = self.reply(Reason::Unknown) {
                    warn!("{}: rejection failed: {}", self.op, e);
                }
                return;
            }
        };

        match target {
            Ok(target) => {
                info!("{}: REFER received, target {}", self.op, target);
                self.op.root().listener().refer_received(&self, target);
            }
            Err(e) => {
                warn!("{}: unparsable Refer-To, rejecting: {}", self.op, e);
                if let Err(e) = self.reply(Reason::Unknown) {
                    warn!("{}: rejection failed: {}", self.op, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalingConfig;
    use crate::root::SignalingListener;
    use crate::transaction::MemoryTransactionProvider;

    struct NoListener;

    impl SignalingListener for NoListener {
        fn refer_received(&self, _operation: &Arc<ReferOperation>, _target: SipAddress) {}
    }

    fn setup() -> (Arc<MemoryTransactionProvider>, Arc<SessionRoot>) {
        let provider = Arc::new(MemoryTransactionProvider::new());
        let root = SessionRoot::new(
            SignalingConfig::default().with_local_domain("example.org"),
            provider.clone(),
            Arc::new(NoListener),
        );
        (provider, root)
    }

    #[test]
    fn test_send_refer_without_destination_fails() {
        let (provider, root) = setup();
        let op = ReferOperation::new(root);

        let result = op.send_refer(&"sip:carol@example.net".parse().unwrap());
        assert!(matches!(result, Err(SignalingError::NoDestination { .. })));
        assert!(provider.sent_requests().is_empty());
        assert_eq!(op.direction(), Direction::Outgoing);
    }

    #[test]
    fn test_contact_is_attached() {
        let (provider, root) = setup();
        let op = ReferOperation::new(root);
        op.set_to("<sip:bob@example.net>".parse().unwrap());
        op.set_contact("<sip:alice@192.0.2.10:5060>".parse().unwrap());

        op.send_refer(&"sip:carol@example.net".parse().unwrap()).unwrap();
        let request = provider.last_request().unwrap();
        assert_eq!(request.header(&HeaderName::Contact), Some("<sip:alice@192.0.2.10:5060>"));
        assert_eq!(request.header(&HeaderName::ReferTo), Some("<sip:carol@example.net>"));
    }

    #[test]
    fn test_reply_before_any_request_fails() {
        let (provider, root) = setup();
        let op = ReferOperation::new(root);
        let error = op.reply(Reason::None).unwrap_err();
        assert!(error.is_sequence_error());
        assert!(provider.sent_responses().is_empty());
    }
}
