//! is-composing timer race tests
//!
//! These tests verify:
//! - A timer callback delivered after its cancel does nothing
//! - A callback for a replaced timer does not act for its successor
//! - The current timer still fires normally afterwards
//!
//! The timer source here never drops a callback on cancel, so a test can
//! deliver an expiry that was already queued when the cancel happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rvoip_chat_core::{ComposingConfig, ComposingIndication, ComposingMode, IsComposing, IsComposingListener};
use rvoip_infra_common::timer::{TimerCallback, TimerHandle, TimerSource};
use rvoip_signaling_core::IdentityAddress;

struct ScheduledTimer {
    handle: TimerHandle,
    delay: Duration,
    callback: Option<TimerCallback>,
    cancelled: bool,
}

/// Timers fired by hand
#[derive(Default)]
struct ManualTimers {
    next_id: AtomicU64,
    timers: Mutex<Vec<ScheduledTimer>>,
}

impl ManualTimers {
    /// Most recently scheduled timer with `delay`
    fn latest(&self, delay: Duration) -> TimerHandle {
        self.timers
            .lock()
            .iter()
            .rev()
            .find(|timer| timer.delay == delay)
            .map(|timer| timer.handle)
            .unwrap()
    }

    fn scheduled_count(&self) -> usize {
        self.timers.lock().len()
    }

    fn is_cancelled(&self, handle: TimerHandle) -> bool {
        self.timers.lock().iter().any(|timer| timer.handle == handle && timer.cancelled)
    }

    /// Run the callback of `handle`, cancelled or not
    fn fire(&self, handle: TimerHandle) {
        let callback = self
            .timers
            .lock()
            .iter_mut()
            .find(|timer| timer.handle == handle)
            .and_then(|timer| timer.callback.take());
        if let Some(callback) = callback {
            callback(handle);
        }
    }
}

impl TimerSource for ManualTimers {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.timers.lock().push(ScheduledTimer { handle, delay, callback: Some(callback), cancelled: false });
        handle
    }

    fn cancel(&self, handle: &TimerHandle) -> bool {
        match self.timers.lock().iter_mut().find(|timer| timer.handle == *handle) {
            Some(timer) if !timer.cancelled => {
                timer.cancelled = true;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Sent(ComposingMode),
    RemoteComposing(IdentityAddress),
    RemoteStopped(IdentityAddress),
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Seen>>,
}

impl Recorder {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }
}

impl IsComposingListener for Recorder {
    fn send_indication(&self, content: String) {
        let indication = ComposingIndication::from_xml(&content).unwrap();
        self.seen.lock().push(Seen::Sent(indication.state));
    }

    fn remote_is_composing(&self, peer: &IdentityAddress) {
        self.seen.lock().push(Seen::RemoteComposing(peer.clone()));
    }

    fn remote_composing_stopped(&self, peer: &IdentityAddress) {
        self.seen.lock().push(Seen::RemoteStopped(peer.clone()));
    }
}

const IDLE: Duration = Duration::from_secs(15);
const REFRESH: Duration = Duration::from_secs(60);
const REMOTE_REFRESH: Duration = Duration::from_secs(120);

fn setup() -> (Arc<IsComposing>, Arc<Recorder>, Arc<ManualTimers>) {
    let timers = Arc::new(ManualTimers::default());
    let recorder = Arc::new(Recorder::default());
    let machine = IsComposing::new(ComposingConfig::default(), timers.clone(), recorder.clone());
    (machine, recorder, timers)
}

fn bob() -> IdentityAddress {
    IdentityAddress::new("bob", "example.net")
}

#[test]
fn test_expiries_queued_before_stop_are_ignored() {
    let (machine, recorder, timers) = setup();

    machine.start_composing();
    let idle = timers.latest(IDLE);
    let refresh = timers.latest(REFRESH);
    machine.stop_composing();
    assert!(timers.is_cancelled(idle));
    assert!(timers.is_cancelled(refresh));

    let scheduled = timers.scheduled_count();
    timers.fire(idle);
    timers.fire(refresh);

    assert_eq!(recorder.seen(), vec![Seen::Sent(ComposingMode::Active), Seen::Sent(ComposingMode::Idle)]);
    assert!(!machine.is_composing());
    // The stale refresh did not reschedule itself
    assert_eq!(timers.scheduled_count(), scheduled);
}

#[test]
fn test_replaced_idle_timer_is_ignored() {
    let (machine, recorder, timers) = setup();

    machine.start_composing();
    let first = timers.latest(IDLE);
    machine.start_composing();
    let second = timers.latest(IDLE);
    assert_ne!(first, second);
    assert!(timers.is_cancelled(first));

    timers.fire(first);
    assert!(machine.is_composing());
    assert_eq!(recorder.seen(), vec![Seen::Sent(ComposingMode::Active)]);

    timers.fire(second);
    assert!(!machine.is_composing());
    assert_eq!(recorder.seen(), vec![Seen::Sent(ComposingMode::Active), Seen::Sent(ComposingMode::Idle)]);
}

#[test]
fn test_replaced_refresh_timer_is_ignored() {
    let (machine, recorder, timers) = setup();

    machine.start_composing();
    let first = timers.latest(REFRESH);
    machine.stop_composing();
    machine.start_composing();
    let second = timers.latest(REFRESH);

    let scheduled = timers.scheduled_count();
    timers.fire(first);
    assert_eq!(timers.scheduled_count(), scheduled);
    assert_eq!(recorder.seen().len(), 3);

    // The live one re-announces and reschedules
    timers.fire(second);
    assert_eq!(
        recorder.seen(),
        vec![
            Seen::Sent(ComposingMode::Active),
            Seen::Sent(ComposingMode::Idle),
            Seen::Sent(ComposingMode::Active),
            Seen::Sent(ComposingMode::Active),
        ]
    );
    assert_eq!(timers.scheduled_count(), scheduled + 1);
    assert!(machine.is_composing());
}

#[test]
fn test_replaced_remote_refresh_is_ignored() {
    let (machine, recorder, timers) = setup();
    let payload = machine.marshal(true).unwrap();

    machine.parse(&bob(), &payload);
    let first = timers.latest(REMOTE_REFRESH);
    machine.parse(&bob(), &payload);
    let second = timers.latest(REMOTE_REFRESH);

    timers.fire(first);
    assert!(machine.is_remote_composing());
    assert_eq!(recorder.seen(), vec![Seen::RemoteComposing(bob()), Seen::RemoteComposing(bob())]);

    timers.fire(second);
    assert!(!machine.is_remote_composing());
    assert_eq!(
        recorder.seen(),
        vec![Seen::RemoteComposing(bob()), Seen::RemoteComposing(bob()), Seen::RemoteStopped(bob())]
    );
}

#[test]
fn test_expiries_after_stop_timers_are_ignored() {
    let (machine, recorder, timers) = setup();

    machine.start_composing();
    machine.parse(&bob(), &machine.marshal(true).unwrap());
    let pending = [timers.latest(IDLE), timers.latest(REFRESH), timers.latest(REMOTE_REFRESH)];
    machine.stop_timers();

    for handle in pending {
        assert!(timers.is_cancelled(handle));
        timers.fire(handle);
    }

    assert_eq!(recorder.seen(), vec![Seen::Sent(ComposingMode::Active), Seen::RemoteComposing(bob())]);
    // Local mode is left as is; the remote slot went with its timer
    assert!(machine.is_composing());
    assert!(!machine.is_remote_composing());
}
