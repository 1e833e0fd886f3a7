//! Operation lifecycle tests
//!
//! These tests verify:
//! - Error records produced by I/O errors, timeouts and responses
//! - Forward-only transitions and termination idempotence
//! - Request construction preconditions
//! - acquire/release on shared operation handles

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rvoip_signaling_core::*;

struct CountingListener {
    calls: parking_lot::Mutex<usize>,
}

impl SignalingListener for CountingListener {
    fn refer_received(&self, _operation: &Arc<ReferOperation>, _target: SipAddress) {
        *self.calls.lock() += 1;
    }
}

fn setup() -> (Arc<MemoryTransactionProvider>, Arc<SessionRoot>, Arc<CountingListener>) {
    let provider = Arc::new(MemoryTransactionProvider::new());
    let listener = Arc::new(CountingListener { calls: parking_lot::Mutex::new(0) });
    let root = SessionRoot::new(
        SignalingConfig::default()
            .with_local_domain("example.org")
            .with_identity("sip:alice@example.org"),
        provider.clone(),
        listener.clone(),
    );
    (provider, root, listener)
}

fn outgoing(root: &Arc<SessionRoot>, provider: &MemoryTransactionProvider) -> (Arc<ReferOperation>, TransactionKey) {
    let op = root.create_refer_operation();
    op.set_to("<sip:bob@example.net>".parse().unwrap());
    let key = op.send_refer(&"sip:carol@example.net".parse().unwrap()).unwrap();
    assert_eq!(provider.pending_client_count(), 1);
    (op, key)
}

#[test]
fn test_io_error_terminates_with_503() {
    let (provider, root, _) = setup();
    let (op, key) = outgoing(&root, &provider);

    assert!(provider.deliver_io_error(&key, "network unreachable"));

    let info = op.error_info();
    assert_eq!(op.state(), OperationState::Terminated);
    assert_eq!(info.reason(), Reason::IoError);
    assert_eq!((info.protocol(), info.code(), info.text()), ("SIP", 503, "IO Error"));
}

#[test]
fn test_timeout_terminates_with_408() {
    let (provider, root, _) = setup();
    let (op, key) = outgoing(&root, &provider);

    assert!(provider.deliver_timeout(&key));

    let info = op.error_info();
    assert_eq!(op.state(), OperationState::Terminated);
    assert_eq!(info.reason(), Reason::RequestTimeout);
    assert_eq!((info.protocol(), info.code(), info.text()), ("SIP", 408, "Request timeout"));
}

#[test]
fn test_failure_response_records_error_without_terminating() {
    let (provider, root, _) = setup();
    let (op, key) = outgoing(&root, &provider);

    let response = Response::new(486).with_header(HeaderName::Warning, "399 pbx \"busy\"");
    assert!(provider.deliver_response(&key, response));

    let info = op.error_info();
    assert_eq!(op.state(), OperationState::Active);
    assert_eq!(info.reason(), Reason::Busy);
    assert_eq!(info.code(), 486);
    assert_eq!(info.text(), "Busy Here");
    assert_eq!(info.warning(), Some("399 pbx \"busy\""));
}

#[test]
fn test_events_after_termination_are_ignored() {
    let (provider, root, listener) = setup();
    let (op, key) = outgoing(&root, &provider);

    assert!(provider.deliver_timeout(&key));
    let terminal = op.error_info();

    // Late deliveries straight to the handlers, as a racing transport would
    op.clone().process_io_error(IoErrorEvent { key: Some(key.clone()), message: "late".into() });
    op.clone().process_timeout(TimeoutEvent { key: key.clone() });
    op.clone().process_response_event(ResponseEvent { key: key.clone(), response: Response::new(500) });
    op.clone().process_request_event(RequestEvent {
        request: Request::new(Method::Refer, "sip:alice@example.org".parse().unwrap())
            .with_header(HeaderName::Via, "SIP/2.0/UDP peer;branch=z9hG4bKlate")
            .with_header(HeaderName::ReferTo, "<sip:carol@example.net>"),
    });

    assert_eq!(op.state(), OperationState::Terminated);
    assert_eq!(op.error_info(), terminal);
    assert_eq!(*listener.calls.lock(), 0);
    assert!(provider.sent_responses().is_empty());
    assert_eq!(op.ref_count(), 1);
}

#[test]
fn test_process_error_is_idempotent() {
    let (_, root, _) = setup();
    let op = root.create_refer_operation();
    op.set_error_info(ErrorInfo::new(Reason::Forbidden, "SIP", 403, "Forbidden", None));

    op.process_error();
    op.process_error();

    assert_eq!(op.state(), OperationState::Terminated);
    assert_eq!(op.error_info().code(), 403);
}

#[test]
fn test_send_failure_leaves_operation_early() {
    let (provider, root, _) = setup();
    let op = root.create_refer_operation();
    op.set_to("<sip:bob@example.net>".parse().unwrap());

    provider.fail_next_send();
    let result = op.send_refer(&"sip:carol@example.net".parse().unwrap());

    assert!(matches!(result, Err(SignalingError::Transaction { .. })));
    assert_eq!(op.state(), OperationState::Early);
    assert_eq!(op.ref_count(), 1);
}

#[test]
fn test_send_after_termination_is_refused() {
    let (provider, root, _) = setup();
    let (op, key) = outgoing(&root, &provider);
    provider.deliver_io_error(&key, "reset");

    let result = op.send_refer(&"sip:carol@example.net".parse().unwrap());
    assert!(matches!(result, Err(SignalingError::InvalidState { .. })));
    assert_eq!(provider.sent_requests().len(), 1);
}

#[test]
fn test_build_request_needs_a_destination() {
    let (_, root, _) = setup();
    let op = root.create_refer_operation();
    assert!(op.build_request(Method::Message).is_none());

    op.set_to("<sip:bob@>".parse().unwrap());
    assert!(op.build_request(Method::Message).is_none());

    op.set_to("<sip:bob@example.net>".parse().unwrap());
    assert!(op.build_request(Method::Message).is_some());
}

#[test]
fn test_build_request_headers() {
    let (_, root, _) = setup();
    let op = root.create_refer_operation();
    op.set_to("<sip:bob@example.net>".parse().unwrap());
    op.set_route(vec!["<sip:proxy.example.org;lr>".parse().unwrap()]);

    let first = op.build_request(Method::Message).unwrap();
    let second = op.build_request(Method::Message).unwrap();

    assert!(first.header(&HeaderName::Via).unwrap().starts_with("SIP/2.0/UDP example.org;branch=z9hG4bK"));
    assert_ne!(first.branch(), second.branch());
    assert_eq!(first.header(&HeaderName::MaxForwards), Some("70"));
    assert_eq!(first.header(&HeaderName::Route), Some("<sip:proxy.example.org;lr>"));
    assert_eq!(first.header(&HeaderName::To), Some("<sip:bob@example.net>"));
    assert_eq!(first.call_id(), second.call_id());

    let from: SipAddress = first.header(&HeaderName::From).unwrap().parse().unwrap();
    assert_eq!(from.uri.to_string(), "sip:alice@example.org");
    assert!(from.tag().is_some());

    let (first_seq, method) = first.cseq().unwrap();
    assert_eq!(method, Method::Message);
    assert_eq!(second.cseq().unwrap().0, first_seq + 1);
}

#[test]
fn test_acquire_and_release() {
    let (_, root, _) = setup();
    let op = root.create_refer_operation();
    assert_eq!(op.ref_count(), 1);

    let extra = op.acquire();
    assert_eq!(op.ref_count(), 2);
    assert_eq!(extra.id(), op.id());

    extra.release();
    assert_eq!(op.ref_count(), 1);
}

#[test]
fn test_operation_display() {
    let (_, root, _) = setup();
    let op = root.create_refer_operation();
    assert_eq!(op.to_string(), format!("refer op {}", op.id()));
    assert_eq!(op.op_type(), OperationType::Refer);
    assert_eq!(op.direction(), Direction::Incoming);
}
