//! Per-job run lock preventing overlapping executions.
//!
//! Each job identity owns one `RunLock`. A fire that cannot take the lock
//! is skipped, never queued, so a slow build cannot stack up behind
//! itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tracks whether a run for one job identity is in flight.
pub struct RunLock {
    is_running: Arc<AtomicBool>,
}

impl RunLock {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attempt to start a run.
    ///
    /// Returns `Some(RunPermit)` when no run is in flight, `None` when a
    /// previous run still holds the lock.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(RunPermit {
                flag: self.is_running.clone(),
            })
        } else {
            None
        }
    }

    /// Whether a run currently holds the lock.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII permit that releases the run lock when dropped.
///
/// The flag is cleared even when the run panics, so a crashed run cannot
/// wedge its job identity.
pub struct RunPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
