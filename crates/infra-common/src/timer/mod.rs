//! One-shot timers for the signaling state machines
//!
//! A [`TimerSource`] schedules a callback after a delay and can cancel it.
//! Every scheduled instance fires at most once; periodic behavior is built by
//! rescheduling from inside the callback.
//!
//! The callback receives the [`TimerHandle`] it was scheduled under. State
//! machines keep the handle of the instance they consider current for each
//! timer role and ignore a callback whose handle no longer matches, which
//! makes a cancel that races an already-dequeued expiry harmless.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use rvoip_infra_common::timer::{TimerSource, TokioTimerSource};
//!
//! # async fn example() -> rvoip_infra_common::Result<()> {
//! let timers = TokioTimerSource::current()?;
//! let handle = timers.schedule(Duration::from_secs(15), Box::new(|fired| {
//!     tracing::info!("timer {} expired", fired.id());
//! }));
//! timers.cancel(&handle);
//! # Ok(())
//! # }
//! ```

pub mod tokio_source;

use std::fmt;
use std::time::Duration;

pub use tokio_source::TokioTimerSource;

/// Callback run when a timer expires
pub type TimerCallback = Box<dyn FnOnce(TimerHandle) + Send + 'static>;

/// Identifies one scheduled timer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a raw timer id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw timer id, unique per timer source
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Source of cancelable one-shot timers
///
/// Implementations must never run `callback` synchronously from inside
/// `schedule`; callers register the returned handle before the callback can
/// observe it.
pub trait TimerSource: Send + Sync {
    /// Run `callback` once after `delay`
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancel a pending timer
    ///
    /// Returns `true` if the timer was still pending. Cancelling an expired
    /// or already cancelled timer is a no-op.
    fn cancel(&self, handle: &TimerHandle) -> bool;
}
