//! Operation state machine
//!
//! An [`Operation`] is one in-flight signaling exchange: it builds requests,
//! hands them to the transaction layer, and turns the events that come back
//! (responses, timeouts, I/O errors) into a state and an [`ErrorInfo`].
//!
//! ## States
//!
//! ```text
//! Early ──send──► Active ──► Terminating ──► Terminated
//!   └──────────────┴──────────────┴──────────────┘
//!                  (I/O error, timeout, reply)
//! ```
//!
//! Transitions only move forward; `Terminated` is absorbing. Every event
//! delivered after termination is ignored.
//!
//! ## Lifetime
//!
//! Concrete operations (see [`ReferOperation`]) live behind an `Arc`. The
//! transaction layer keeps its own clone for every transaction that can
//! still call back, so the operation outlives the application's handle
//! whenever a callback is pending. [`OperationRef`] names the
//! acquire/release pair on that handle.

pub mod refer;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::errors::{SignalingError, SignalingResult};
use crate::message::{HeaderName, Method, Request, Response, SipAddress, SipUri};
use crate::reason::ErrorInfo;
use crate::root::SessionRoot;
use crate::transaction::{IoErrorEvent, ResponseEvent, TimeoutEvent, TransactionKey, TransactionUser};

pub use refer::ReferOperation;

/// Unique identifier of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of exchange an operation carries; fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Register,
    Invite,
    Refer,
    Message,
    Presence,
    Publish,
    Subscribe,
    Info,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::Register => "register",
            OperationType::Invite => "invite",
            OperationType::Refer => "refer",
            OperationType::Message => "message",
            OperationType::Presence => "presence",
            OperationType::Publish => "publish",
            OperationType::Subscribe => "subscribe",
            OperationType::Info => "info",
        };
        f.write_str(name)
    }
}

/// Which side started the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
}

/// Lifecycle state; ordered so that transitions can only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationState {
    Early,
    Active,
    Terminating,
    Terminated,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Mutable part of an operation
struct OperationInner {
    direction: Direction,
    state: OperationState,
    error_info: ErrorInfo,

    /// Local address; falls back to the configured identity
    from: Option<SipAddress>,

    /// Destination; required by `build_request`
    to: Option<SipAddress>,

    /// Pre-loaded route set
    route: Vec<SipAddress>,

    /// Our contact, attached to requests that need one
    contact: Option<SipAddress>,

    call_id: String,
    local_cseq: u32,
    local_tag: String,

    /// Last client transaction started by this operation
    client_transaction: Option<TransactionKey>,
}

/// Generic signaling exchange
///
/// Not used on its own: concrete operations embed one and implement
/// [`TransactionUser`] by delegating the shared handlers below.
pub struct Operation {
    id: OperationId,
    op_type: OperationType,
    root: Arc<SessionRoot>,
    inner: Mutex<OperationInner>,
}

impl Operation {
    /// Create an operation in the `Early` state
    pub fn new(root: Arc<SessionRoot>, op_type: OperationType) -> Self {
        let op = Self {
            id: OperationId::new(),
            op_type,
            root,
            inner: Mutex::new(OperationInner {
                direction: Direction::default(),
                state: OperationState::Early,
                error_info: ErrorInfo::none(),
                from: None,
                to: None,
                route: Vec::new(),
                contact: None,
                call_id: Uuid::new_v4().simple().to_string(),
                local_cseq: rand::thread_rng().gen_range(1..10_000),
                local_tag: format!("{:08x}", rand::thread_rng().next_u32()),
                client_transaction: None,
            }),
        };
        debug!("Created {}", op);
        op
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    /// The session root this operation belongs to
    pub fn root(&self) -> &Arc<SessionRoot> {
        &self.root
    }

    pub fn direction(&self) -> Direction {
        self.inner.lock().direction
    }

    pub fn set_direction(&self, direction: Direction) {
        self.inner.lock().direction = direction;
    }

    pub fn state(&self) -> OperationState {
        self.inner.lock().state
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == OperationState::Terminated
    }

    /// Snapshot of the current error record
    pub fn error_info(&self) -> ErrorInfo {
        self.inner.lock().error_info.clone()
    }

    /// Replace the error record
    pub fn set_error_info(&self, info: ErrorInfo) {
        self.inner.lock().error_info = info;
    }

    /// Replace the error record with one derived from `response`
    pub fn set_error_info_from_response(&self, response: &Response) {
        self.set_error_info(ErrorInfo::from_response(response));
    }

    pub fn from(&self) -> Option<SipAddress> {
        self.inner.lock().from.clone()
    }

    pub fn set_from(&self, from: SipAddress) {
        self.inner.lock().from = Some(from);
    }

    pub fn to(&self) -> Option<SipAddress> {
        self.inner.lock().to.clone()
    }

    pub fn set_to(&self, to: SipAddress) {
        self.inner.lock().to = Some(to);
    }

    pub fn route(&self) -> Vec<SipAddress> {
        self.inner.lock().route.clone()
    }

    pub fn set_route(&self, route: Vec<SipAddress>) {
        self.inner.lock().route = route;
    }

    pub fn contact(&self) -> Option<SipAddress> {
        self.inner.lock().contact.clone()
    }

    pub fn set_contact(&self, contact: SipAddress) {
        self.inner.lock().contact = Some(contact);
    }

    pub fn call_id(&self) -> String {
        self.inner.lock().call_id.clone()
    }

    /// Key of the last client transaction started by this operation
    pub fn client_transaction(&self) -> Option<TransactionKey> {
        self.inner.lock().client_transaction.clone()
    }

    /// Build an outgoing request bound to this operation
    ///
    /// Returns `None` when no destination is set or the destination has no
    /// host; callers must not go on to `send_request` in that case.
    pub fn build_request(&self, method: Method) -> Option<Request> {
        let config = self.root.config();
        let mut inner = self.inner.lock();

        let to = match inner.to.as_ref() {
            Some(to) if to.uri.has_host() => to.clone(),
            _ => {
                debug!("{}: no resolvable destination for {}", self, method);
                return None;
            }
        };

        let from = inner
            .from
            .clone()
            .or_else(|| config.identity.as_deref().and_then(|identity| identity.parse().ok()))
            .unwrap_or_else(|| SipAddress::new(SipUri::new(Some("anonymous"), Some(&config.local_domain))))
            .with_tag(inner.local_tag.clone());

        inner.local_cseq += 1;

        let mut request = Request::new(method, to.uri.clone())
            .with_header(
                HeaderName::Via,
                format!("SIP/2.0/UDP {};branch=z9hG4bK{}", config.local_domain, Uuid::new_v4().simple()),
            )
            .with_header(HeaderName::MaxForwards, config.max_forwards.to_string());
        for route in &inner.route {
            request.add_header(HeaderName::Route, route.to_string());
        }
        request.add_header(HeaderName::From, from.to_string());
        request.add_header(HeaderName::To, to.to_string());
        request.add_header(HeaderName::CallId, inner.call_id.clone());
        request.add_header(HeaderName::CSeq, format!("{} {}", inner.local_cseq, method));
        request.add_header(HeaderName::UserAgent, config.user_agent.clone());

        Some(request)
    }

    /// Hand `request` to the transaction layer
    ///
    /// Returns as soon as the request is dispatched; the outcome arrives
    /// later through `user`'s [`TransactionUser`] handlers. On success an
    /// `Early` operation becomes `Active`.
    pub fn send_request(&self, request: Request, user: Arc<dyn TransactionUser>) -> SignalingResult<TransactionKey> {
        if self.is_terminated() {
            return Err(SignalingError::invalid_state(format!("{} is terminated", self)));
        }

        let method = request.method();
        let key = self.root.provider().send_request(request, user).map_err(|e| {
            warn!("{}: failed to send {}: {}", self, method, e);
            e
        })?;

        let mut inner = self.inner.lock();
        inner.client_transaction = Some(key.clone());
        self.transition(&mut inner, OperationState::Active);
        drop(inner);

        debug!("{}: sent {} on {}", self, method, key);
        Ok(key)
    }

    /// Move to `Terminated`, keeping the error record already in place
    ///
    /// Repeated calls are no-ops.
    pub fn process_error(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, OperationState::Terminated);
    }

    /// Adopt the dialog identifiers of an inbound request
    pub(crate) fn bind_inbound_request(&self, request: &Request) {
        let mut inner = self.inner.lock();
        inner.direction = Direction::Incoming;
        if let Some(from) = request.header(&HeaderName::From).and_then(|v| v.parse().ok()) {
            inner.to = Some(from);
        }
        if let Some(to) = request.header(&HeaderName::To).and_then(|v| v.parse().ok()) {
            inner.from = Some(to);
        }
        if let Some(call_id) = request.call_id() {
            inner.call_id = call_id.to_string();
        }
    }

    /// Transport failed: terminal with `IoError`
    pub(crate) fn handle_io_error(&self, event: IoErrorEvent) {
        warn!("{}: I/O error: {}", self, event.message);
        self.terminate_with(ErrorInfo::io_error(), "I/O error");
    }

    /// No final response in time: terminal with `RequestTimeout`
    pub(crate) fn handle_timeout(&self, event: TimeoutEvent) {
        warn!("{}: transaction {} timed out", self, event.key);
        self.terminate_with(ErrorInfo::request_timeout(), "timeout");
    }

    /// Record the response outcome; the state is left to the caller
    pub(crate) fn handle_response(&self, event: ResponseEvent) {
        let mut inner = self.inner.lock();
        if inner.state == OperationState::Terminated {
            debug!("{}: ignoring {} response, already terminated", self, event.response.status());
            return;
        }

        debug!("{}: received {} {}", self, event.response.status(), event.response.reason_phrase());
        inner.error_info = ErrorInfo::from_response(&event.response);
        if event.response.is_final() && inner.client_transaction.as_ref() == Some(&event.key) {
            inner.client_transaction = None;
        }
    }

    fn terminate_with(&self, info: ErrorInfo, cause: &str) {
        let mut inner = self.inner.lock();
        if inner.state == OperationState::Terminated {
            debug!("{}: ignoring {}, already terminated", self, cause);
            return;
        }
        inner.error_info = info;
        inner.client_transaction = None;
        self.transition(&mut inner, OperationState::Terminated);
    }

    /// Forward-only state change; returns whether the state moved
    fn transition(&self, inner: &mut OperationInner, next: OperationState) -> bool {
        if next <= inner.state {
            trace!("{}: staying in {} (requested {})", self, inner.state, next);
            return false;
        }

        info!("{}: {} -> {}", self, inner.state, next);
        inner.state = next;
        true
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} op {}", self.op_type, self.id)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("op_type", &self.op_type)
            .field("direction", &inner.direction)
            .field("state", &inner.state)
            .field("error_info", &inner.error_info)
            .finish()
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        debug!("Destroying {}", self);
    }
}

/// Explicit acquire/release on a shared operation handle
///
/// `acquire` is a clone of the `Arc` and `release` drops it; the operation
/// is destroyed when the last handle, including those held by the
/// transaction layer, is released.
pub trait OperationRef: Sized {
    fn acquire(&self) -> Self;

    fn release(self);

    /// Number of live handles
    fn ref_count(&self) -> usize;
}

impl<T> OperationRef for Arc<T>
where
    T: AsRef<Operation>,
{
    fn acquire(&self) -> Self {
        let count = Arc::strong_count(self);
        trace!("{}: acquire ({} -> {})", AsRef::<Operation>::as_ref(&**self), count, count + 1);
        Arc::clone(self)
    }

    fn release(self) {
        let count = Arc::strong_count(&self);
        trace!("{}: release ({} -> {})", AsRef::<Operation>::as_ref(&*self), count, count - 1);
        drop(self);
    }

    fn ref_count(&self) -> usize {
        Arc::strong_count(self)
    }
}
