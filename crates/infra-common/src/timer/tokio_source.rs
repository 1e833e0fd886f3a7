use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{TimerCallback, TimerHandle, TimerSource};
use crate::errors::{Error, Result};

/// [`TimerSource`] backed by tokio tasks
///
/// Each timer is a spawned task sleeping for the requested delay. Pending
/// timers are tracked by id; whoever removes the entry first wins, so a
/// cancel and an expiry can never both act on the same instance.
pub struct TokioTimerSource {
    runtime: Handle,
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, Option<JoinHandle<()>>>>,
}

impl TokioTimerSource {
    /// Create a timer source spawning onto `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Create a timer source on the runtime of the calling task
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Timer(format!("no tokio runtime: {}", e)))
    }

    /// Number of timers scheduled but neither fired nor cancelled
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl TimerSource for TokioTimerSource {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TimerHandle::new(id);

        // Registered before the task exists so an immediate expiry still finds it
        self.pending.insert(id, None);

        let pending = self.pending.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if pending.remove(&id).is_some() {
                trace!("{} expired", handle);
                callback(handle);
            }
        });

        match self.pending.get_mut(&id) {
            Some(mut entry) => *entry = Some(task),
            // Cancelled between registration and spawn
            None => task.abort(),
        }

        trace!("Scheduled {} in {:?}", handle, delay);
        handle
    }

    fn cancel(&self, handle: &TimerHandle) -> bool {
        match self.pending.remove(&handle.id()) {
            Some((_, task)) => {
                if let Some(task) = task {
                    task.abort();
                }
                trace!("Cancelled {}", handle);
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioTimerSource {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            if let Some(task) = entry.value() {
                task.abort();
            }
        }
        self.pending.clear();
    }
}
