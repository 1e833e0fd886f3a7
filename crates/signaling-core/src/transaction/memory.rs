//! In-memory transaction provider
//!
//! Implements [`TransactionProvider`] without any network: requests and
//! responses are recorded, and transport events are injected with the
//! `deliver_*` methods. Used to embed the operations in simulations and to
//! drive them in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    IoErrorEvent, ResponseEvent, ServerTransaction, TimeoutEvent, TransactionKey, TransactionProvider,
    TransactionUser,
};
use crate::errors::{SignalingError, SignalingResult};
use crate::message::{HeaderName, Method, Request, Response};

struct ClientEntry {
    user: Arc<dyn TransactionUser>,
}

struct ServerEntry {
    request: Request,
    user: Option<Arc<dyn TransactionUser>>,
}

/// Transaction provider that keeps everything in memory
#[derive(Default)]
pub struct MemoryTransactionProvider {
    clients: DashMap<TransactionKey, ClientEntry>,
    servers: DashMap<TransactionKey, ServerEntry>,
    sent_requests: Mutex<Vec<Request>>,
    sent_responses: Mutex<Vec<(TransactionKey, Response)>>,
    fail_next_send: AtomicBool,
}

impl MemoryTransactionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send_request` fail as if the transport refused it
    pub fn fail_next_send(&self) {
        self.fail_next_send.store(true, Ordering::SeqCst);
    }

    /// Every request dispatched so far
    pub fn sent_requests(&self) -> Vec<Request> {
        self.sent_requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.sent_requests.lock().last().cloned()
    }

    /// Every response sent so far
    pub fn sent_responses(&self) -> Vec<Response> {
        self.sent_responses.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Responses sent on one server transaction
    pub fn responses_for(&self, key: &TransactionKey) -> Vec<Response> {
        self.sent_responses
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Client transactions still waiting for a final outcome
    pub fn pending_client_count(&self) -> usize {
        self.clients.len()
    }

    /// Server transactions still waiting for a final response
    pub fn server_transaction_count(&self) -> usize {
        self.servers.len()
    }

    /// Whether a server transaction currently holds an operation reference
    pub fn has_application_data(&self, key: &TransactionKey) -> bool {
        self.servers.get(key).is_some_and(|entry| entry.user.is_some())
    }

    /// Deliver a response on a client transaction
    ///
    /// A final response completes the transaction and releases its user.
    /// Returns `false` if the transaction is unknown.
    pub fn deliver_response(&self, key: &TransactionKey, response: Response) -> bool {
        // The map guard must be gone before the user runs
        let user = if response.is_final() {
            self.clients.remove(key).map(|(_, entry)| entry.user)
        } else {
            self.clients.get(key).map(|entry| entry.user.clone())
        };

        match user {
            Some(user) => {
                user.process_response_event(ResponseEvent { key: key.clone(), response });
                true
            }
            None => {
                debug!("Dropping response for unknown transaction {}", key);
                false
            }
        }
    }

    /// Report a timeout on a client transaction and release its user
    pub fn deliver_timeout(&self, key: &TransactionKey) -> bool {
        match self.clients.remove(key) {
            Some((_, entry)) => {
                entry.user.process_timeout(TimeoutEvent { key: key.clone() });
                true
            }
            None => false,
        }
    }

    /// Terminate a server transaction that never got a final response
    ///
    /// Models Timer H / Timer J cleanup: the entry is removed and the
    /// operation parked on it, if any, receives a timeout and is released.
    /// Returns `false` if the transaction is unknown.
    pub fn terminate_server_transaction(&self, key: &TransactionKey) -> bool {
        let Some((_, entry)) = self.servers.remove(key) else {
            return false;
        };

        debug!("Server transaction {} terminated without a final response", key);
        if let Some(user) = entry.user {
            user.process_timeout(TimeoutEvent { key: key.clone() });
        }
        true
    }

    /// Report a transport failure on a client transaction and release its user
    pub fn deliver_io_error(&self, key: &TransactionKey, message: impl Into<String>) -> bool {
        match self.clients.remove(key) {
            Some((_, entry)) => {
                entry.user.process_io_error(IoErrorEvent {
                    key: Some(key.clone()),
                    message: message.into(),
                });
                true
            }
            None => false,
        }
    }
}

fn branch_of(request: &Request) -> String {
    request
        .branch()
        .map(str::to_string)
        .unwrap_or_else(|| format!("z9hG4bK{}", Uuid::new_v4().simple()))
}

impl TransactionProvider for MemoryTransactionProvider {
    fn send_request(&self, request: Request, user: Arc<dyn TransactionUser>) -> SignalingResult<TransactionKey> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(SignalingError::transaction("transport refused the request"));
        }

        let key = TransactionKey::new(branch_of(&request), request.method(), false);
        if self.clients.contains_key(&key) {
            return Err(SignalingError::transaction(format!("client transaction {} already exists", key)));
        }

        debug!("Sending {} on {}", request.method(), key);
        self.clients.insert(key.clone(), ClientEntry { user });
        self.sent_requests.lock().push(request);
        Ok(key)
    }

    fn create_server_transaction(&self, request: &Request) -> SignalingResult<ServerTransaction> {
        let key = TransactionKey::new(branch_of(request), request.method(), true);
        if self.servers.contains_key(&key) {
            return Err(SignalingError::transaction(format!("server transaction {} already exists", key)));
        }

        self.servers.insert(key.clone(), ServerEntry { request: request.clone(), user: None });
        Ok(ServerTransaction::new(key, request.clone()))
    }

    fn set_application_data(&self, transaction: &ServerTransaction, user: Arc<dyn TransactionUser>) {
        match self.servers.get_mut(transaction.key()) {
            Some(mut entry) => entry.user = Some(user),
            None => warn!("Cannot attach operation to unknown transaction {}", transaction.key()),
        }
    }

    fn send_response(&self, transaction: &ServerTransaction, response: Response) -> SignalingResult<()> {
        let key = transaction.key();
        let expected = self
            .servers
            .get(key)
            .map(|entry| entry.request.cseq())
            .ok_or_else(|| SignalingError::transaction(format!("no server transaction {}", key)))?;

        if let (Some(expected), Some(actual)) = (expected, response_cseq(&response)) {
            if expected != actual {
                return Err(SignalingError::transaction(format!("response CSeq does not match {}", key)));
            }
        }

        debug!("Sending {} {} on {}", response.status(), response.reason_phrase(), key);
        let is_final = response.is_final();
        self.sent_responses.lock().push((key.clone(), response));

        if is_final {
            // Releases the operation reference held for the reply path
            self.servers.remove(key);
        }
        Ok(())
    }
}

fn response_cseq(response: &Response) -> Option<(u32, Method)> {
    let mut parts = response.header(&HeaderName::CSeq)?.split_whitespace();
    let number = parts.next()?.parse().ok()?;
    let method = parts.next()?.parse().ok()?;
    Some((number, method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::RequestEvent;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingUser {
        responses: AtomicUsize,
        timeouts: AtomicUsize,
        io_errors: AtomicUsize,
    }

    impl TransactionUser for CountingUser {
        fn process_io_error(self: Arc<Self>, _event: IoErrorEvent) {
            self.io_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn process_timeout(self: Arc<Self>, _event: TimeoutEvent) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }

        fn process_response_event(self: Arc<Self>, _event: ResponseEvent) {
            self.responses.fetch_add(1, Ordering::SeqCst);
        }

        fn process_request_event(self: Arc<Self>, _event: RequestEvent) {}
    }

    fn request(branch: &str) -> Request {
        Request::new(Method::Message, "sip:bob@example.com".parse().unwrap())
            .with_header(HeaderName::Via, format!("SIP/2.0/UDP host;branch={}", branch))
            .with_header(HeaderName::CSeq, "1 MESSAGE")
    }

    #[test]
    fn test_client_transaction_holds_user_until_final() {
        let provider = MemoryTransactionProvider::new();
        let user = Arc::new(CountingUser::default());

        let key = provider.send_request(request("z9hG4bKa"), user.clone()).unwrap();
        assert_eq!(Arc::strong_count(&user), 2);

        assert!(provider.deliver_response(&key, Response::new(180)));
        assert_eq!(Arc::strong_count(&user), 2);

        assert!(provider.deliver_response(&key, Response::new(200)));
        assert_eq!(Arc::strong_count(&user), 1);
        assert_eq!(user.responses.load(Ordering::SeqCst), 2);

        // Transaction is gone: late events are dropped
        assert!(!provider.deliver_timeout(&key));
        assert_eq!(provider.pending_client_count(), 0);
    }

    #[test]
    fn test_timeout_and_io_error_release_user() {
        let provider = MemoryTransactionProvider::new();
        let user = Arc::new(CountingUser::default());

        let first = provider.send_request(request("z9hG4bKb"), user.clone()).unwrap();
        let second = provider.send_request(request("z9hG4bKc"), user.clone()).unwrap();

        assert!(provider.deliver_timeout(&first));
        assert!(provider.deliver_io_error(&second, "connection reset"));
        assert_eq!(user.timeouts.load(Ordering::SeqCst), 1);
        assert_eq!(user.io_errors.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::strong_count(&user), 1);
    }

    #[test]
    fn test_failed_send_is_reported_synchronously() {
        let provider = MemoryTransactionProvider::new();
        provider.fail_next_send();
        let result = provider.send_request(request("z9hG4bKd"), Arc::new(CountingUser::default()));
        assert!(matches!(result, Err(SignalingError::Transaction { .. })));
        assert!(provider.sent_requests().is_empty());
    }

    #[test]
    fn test_server_transaction_released_on_final_response() {
        let provider = MemoryTransactionProvider::new();
        let user = Arc::new(CountingUser::default());
        let inbound = request("z9hG4bKe");

        let tx = provider.create_server_transaction(&inbound).unwrap();
        assert!(provider.create_server_transaction(&inbound).is_err());

        provider.set_application_data(&tx, user.clone());
        assert!(provider.has_application_data(tx.key()));
        assert_eq!(Arc::strong_count(&user), 2);

        provider.send_response(&tx, Response::from_request(&inbound, 100)).unwrap();
        assert_eq!(Arc::strong_count(&user), 2);

        provider.send_response(&tx, Response::from_request(&inbound, 200)).unwrap();
        assert_eq!(Arc::strong_count(&user), 1);
        assert_eq!(provider.responses_for(tx.key()).len(), 2);

        assert!(provider.send_response(&tx, Response::from_request(&inbound, 200)).is_err());
    }

    #[test]
    fn test_terminated_server_transaction_times_out_its_user() {
        let provider = MemoryTransactionProvider::new();
        let user = Arc::new(CountingUser::default());
        let inbound = request("z9hG4bKf");

        let tx = provider.create_server_transaction(&inbound).unwrap();
        provider.set_application_data(&tx, user.clone());
        assert_eq!(Arc::strong_count(&user), 2);

        assert!(provider.terminate_server_transaction(tx.key()));
        assert_eq!(user.timeouts.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::strong_count(&user), 1);
        assert_eq!(provider.server_transaction_count(), 0);

        assert!(!provider.terminate_server_transaction(tx.key()));
        assert!(provider.send_response(&tx, Response::from_request(&inbound, 200)).is_err());
    }
}
