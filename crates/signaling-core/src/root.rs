//! Session root
//!
//! Shared context of every operation: configuration, transaction provider
//! and the application listener. Inbound requests that belong to no
//! existing operation enter here and are dispatched by method.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SignalingConfig;
use crate::message::{Method, Response, SipAddress};
use crate::op::ReferOperation;
use crate::transaction::{RequestEvent, TransactionProvider, TransactionUser};

/// Application callbacks
///
/// Called on the transaction layer's delivery context with no operation
/// lock held, so implementations may call back into the operation.
pub trait SignalingListener: Send + Sync {
    /// An inbound REFER asks us to contact `target`
    ///
    /// Answer with [`ReferOperation::reply`], now or later. Keep a clone of
    /// `operation` to reply later.
    fn refer_received(&self, operation: &Arc<ReferOperation>, target: SipAddress);
}

type RequestHandler = fn(&Arc<SessionRoot>, RequestEvent);

/// Inbound request dispatch, by method
const REQUEST_HANDLERS: &[(Method, RequestHandler)] = &[(Method::Refer, SessionRoot::handle_refer)];

/// Owner of everything operations share
pub struct SessionRoot {
    config: SignalingConfig,
    provider: Arc<dyn TransactionProvider>,
    listener: Arc<dyn SignalingListener>,
}

impl SessionRoot {
    pub fn new(
        config: SignalingConfig,
        provider: Arc<dyn TransactionProvider>,
        listener: Arc<dyn SignalingListener>,
    ) -> Arc<Self> {
        info!("Creating session root for {}", config.local_domain);
        Arc::new(Self { config, provider, listener })
    }

    pub fn config(&self) -> &SignalingConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn TransactionProvider {
        self.provider.as_ref()
    }

    pub fn listener(&self) -> &dyn SignalingListener {
        self.listener.as_ref()
    }

    /// Create an outgoing REFER operation
    pub fn create_refer_operation(self: &Arc<Self>) -> Arc<ReferOperation> {
        ReferOperation::new(Arc::clone(self))
    }

    /// Entry point for requests outside any existing operation
    ///
    /// Methods without a handler are answered 501 Not Implemented.
    pub fn process_request_event(self: &Arc<Self>, event: RequestEvent) {
        let method = event.request.method();
        match REQUEST_HANDLERS.iter().find(|(m, _)| *m == method) {
            Some((_, handler)) => handler(self, event),
            None => self.reject_unsupported(event),
        }
    }

    fn handle_refer(root: &Arc<SessionRoot>, event: RequestEvent) {
        let op = root.create_refer_operation();
        debug!("Dispatching inbound REFER to {}", op);
        op.process_request_event(event);
    }

    fn reject_unsupported(&self, event: RequestEvent) {
        let request = event.request;
        if request.method() == Method::Ack {
            debug!("Ignoring stray ACK");
            return;
        }

        warn!("No handler for {}, answering 501", request.method());
        let result = self
            .provider
            .create_server_transaction(&request)
            .and_then(|tx| self.provider.send_response(&tx, Response::from_request(&request, 501)));
        if let Err(e) = result {
            warn!("Failed to reject {}: {}", request.method(), e);
        }
    }
}
