use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rvoip_infra_common::timer::{TimerHandle, TimerSource};
use rvoip_signaling_core::IdentityAddress;
use tracing::{debug, error, info, trace, warn};

use super::IsComposingListener;
use super::payload::{self, ComposingMode};
use crate::config::ComposingConfig;
use crate::errors::ComposingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerRole {
    Idle,
    Refresh,
    RemoteRefresh,
}

impl fmt::Display for TimerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerRole::Idle => "idle",
            TimerRole::Refresh => "refresh",
            TimerRole::RemoteRefresh => "remote refresh",
        };
        f.write_str(name)
    }
}

/// Timers and mode; one instance per role at most
#[derive(Default)]
struct ComposingState {
    mode: ComposingMode,
    idle_timer: Option<TimerHandle>,
    refresh_timer: Option<TimerHandle>,
    /// Pending remote refresh and the peer it belongs to
    remote_refresh: Option<(TimerHandle, IdentityAddress)>,
}

/// is-composing state machine of one conversation
///
/// Local side: [`start_composing`](Self::start_composing) on every
/// keystroke. The first one announces `active` and starts the refresh
/// timer; later ones only push the idle timer back. `idle` is announced
/// after `idle_timeout` of silence or on [`stop_composing`](Self::stop_composing).
///
/// Remote side: [`parse`](Self::parse) every received payload. An `active`
/// from a peer is trusted for `remote_refresh_timeout`, after which the
/// peer is reported as stopped. One peer is tracked at a time; a payload
/// from another peer first reports the tracked one as stopped.
///
/// Timer callbacks carry their own handle and do nothing unless it is still
/// the registered handle for their role, so a cancel racing an expiry is
/// harmless. Callbacks hold only a weak reference; dropping the machine
/// cancels its timers.
pub struct IsComposing {
    config: ComposingConfig,
    timers: Arc<dyn TimerSource>,
    listener: Arc<dyn IsComposingListener>,
    this: Weak<IsComposing>,
    state: Mutex<ComposingState>,
}

impl IsComposing {
    pub fn new(
        config: ComposingConfig,
        timers: Arc<dyn TimerSource>,
        listener: Arc<dyn IsComposingListener>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            timers,
            listener,
            this: this.clone(),
            state: Mutex::new(ComposingState::default()),
        })
    }

    pub fn config(&self) -> &ComposingConfig {
        &self.config
    }

    /// Payload announcing the given local state
    pub fn marshal(&self, is_composing: bool) -> ComposingResult<String> {
        payload::marshal(is_composing, self.config.refresh_timeout_secs)
    }

    /// Whether we are announcing `active`
    pub fn is_composing(&self) -> bool {
        self.state.lock().mode == ComposingMode::Active
    }

    /// Whether a peer's `active` is currently trusted
    pub fn is_remote_composing(&self) -> bool {
        self.state.lock().remote_refresh.is_some()
    }

    /// Peer whose `active` is currently trusted
    pub fn remote_peer(&self) -> Option<IdentityAddress> {
        self.state.lock().remote_refresh.as_ref().map(|(_, peer)| peer.clone())
    }

    /// Local typing activity
    pub fn start_composing(&self) {
        let mut state = self.state.lock();

        if let Some(previous) = state.idle_timer.take() {
            self.timers.cancel(&previous);
        }
        state.idle_timer = Some(self.schedule(TimerRole::Idle, self.config.idle_timeout()));

        if state.mode == ComposingMode::Active {
            return;
        }

        info!("Local composing: idle -> active");
        state.mode = ComposingMode::Active;
        if let Some(previous) = state.refresh_timer.take() {
            self.timers.cancel(&previous);
        }
        state.refresh_timer = Some(self.schedule(TimerRole::Refresh, self.config.refresh_timeout()));
        drop(state);

        self.send(true);
    }

    /// Explicit stop; same as an idle timeout happening now
    pub fn stop_composing(&self) {
        self.enter_idle(self.state.lock());
    }

    /// Cancel every timer without sending anything
    pub fn stop_timers(&self) {
        cancel_all(self.timers.as_ref(), &mut self.state.lock());
    }

    /// Handle a payload received from `peer`
    ///
    /// Payloads that fail to parse are logged and otherwise ignored.
    pub fn parse(&self, peer: &IdentityAddress, content: &str) {
        let indication = match payload::parse(content) {
            Ok(indication) => indication,
            Err(e) => {
                warn!("Ignoring is-composing payload from {}: {}", peer, e);
                return;
            }
        };

        let mut state = self.state.lock();
        let replaced = match state.remote_refresh.take() {
            Some((previous, previous_peer)) => {
                self.timers.cancel(&previous);
                (previous_peer != *peer).then_some(previous_peer)
            }
            None => None,
        };

        let active = indication.state == ComposingMode::Active;
        if active {
            debug!("{} is composing (refresh {:?}s)", peer, indication.refresh);
            let handle = self.schedule(TimerRole::RemoteRefresh, self.config.remote_refresh_timeout());
            state.remote_refresh = Some((handle, peer.clone()));
        } else {
            debug!("{} stopped composing", peer);
        }
        drop(state);

        if let Some(previous_peer) = replaced {
            debug!("{} replaces {} as composing peer", peer, previous_peer);
            self.listener.remote_composing_stopped(&previous_peer);
        }
        if active {
            self.listener.remote_is_composing(peer);
        } else {
            self.listener.remote_composing_stopped(peer);
        }
    }

    /// Schedule a timer whose callback calls back into this machine
    ///
    /// Must not be relied on to fire synchronously; the caller stores the
    /// handle before the callback can look for it.
    fn schedule(&self, role: TimerRole, delay: Duration) -> TimerHandle {
        let this = self.this.clone();
        self.timers.schedule(
            delay,
            Box::new(move |fired| {
                if let Some(machine) = this.upgrade() {
                    machine.on_timer(role, fired);
                }
            }),
        )
    }

    fn on_timer(&self, role: TimerRole, fired: TimerHandle) {
        let mut state = self.state.lock();
        match role {
            TimerRole::Idle => {
                if state.idle_timer != Some(fired) {
                    trace!("Stale {} {}", role, fired);
                    return;
                }
                state.idle_timer = None;
                debug!("Idle timer expired");
                self.enter_idle(state);
            }
            TimerRole::Refresh => {
                if state.refresh_timer != Some(fired) {
                    trace!("Stale {} {}", role, fired);
                    return;
                }
                if state.mode != ComposingMode::Active {
                    state.refresh_timer = None;
                    return;
                }
                debug!("Refresh timer expired, re-announcing active");
                state.refresh_timer = Some(self.schedule(TimerRole::Refresh, self.config.refresh_timeout()));
                drop(state);
                self.send(true);
            }
            TimerRole::RemoteRefresh => {
                let current = state.remote_refresh.as_ref().is_some_and(|(handle, _)| *handle == fired);
                let peer = if current { state.remote_refresh.take().map(|(_, peer)| peer) } else { None };
                drop(state);
                match peer {
                    Some(peer) => {
                        info!("No refresh from {}, assuming it stopped composing", peer);
                        self.listener.remote_composing_stopped(&peer);
                    }
                    None => trace!("Stale {} {}", role, fired),
                }
            }
        }
    }

    fn enter_idle(&self, mut state: MutexGuard<'_, ComposingState>) {
        if let Some(idle) = state.idle_timer.take() {
            self.timers.cancel(&idle);
        }
        if let Some(refresh) = state.refresh_timer.take() {
            self.timers.cancel(&refresh);
        }
        if state.mode == ComposingMode::Idle {
            return;
        }

        info!("Local composing: active -> idle");
        state.mode = ComposingMode::Idle;
        drop(state);

        self.send(false);
    }

    fn send(&self, is_composing: bool) {
        match self.marshal(is_composing) {
            Ok(content) => self.listener.send_indication(content),
            Err(e) => error!("Failed to build is-composing payload: {}", e),
        }
    }
}

fn cancel_all(timers: &dyn TimerSource, state: &mut ComposingState) {
    let handles = [
        state.idle_timer.take(),
        state.refresh_timer.take(),
        state.remote_refresh.take().map(|(handle, _)| handle),
    ];
    for handle in handles.into_iter().flatten() {
        timers.cancel(&handle);
    }
}

impl Drop for IsComposing {
    fn drop(&mut self) {
        cancel_all(self.timers.as_ref(), self.state.get_mut());
    }
}

impl fmt::Debug for IsComposing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IsComposing")
            .field("mode", &state.mode)
            .field("idle_timer", &state.idle_timer)
            .field("refresh_timer", &state.refresh_timer)
            .field("remote_refresh", &state.remote_refresh)
            .finish()
    }
}
