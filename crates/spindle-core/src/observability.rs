use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of a pool's counters.
///
/// Once `Pool::shutdown` has returned,
/// `succeeded + failed + panicked == submitted` and `outstanding == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    /// Items accepted by `submit` / `try_submit`.
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub panicked: usize,
    /// Accepted but not yet completed (queued or running).
    pub outstanding: usize,
    /// Waiting in the queue.
    pub queued: usize,
}

impl PoolCounts {
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed + self.panicked
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    panicked: AtomicUsize,
}

impl Counters {
    pub(crate) fn submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo `submitted` for an item the queue refused.
    pub(crate) fn retract_submitted(&self) {
        self.submitted.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, outstanding: usize, queued: usize) -> PoolCounts {
        PoolCounts {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            outstanding,
            queued,
        }
    }
}
