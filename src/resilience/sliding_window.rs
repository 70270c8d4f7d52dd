//! Count-based sliding window of call outcomes.
//!
//! # Responsibilities
//! - Record the outcome of every completed call
//! - Retain at most `capacity` outcomes, evicting the oldest first
//! - Report failure rate and call count over exactly the retained outcomes
//!
//! # Design Decisions
//! - Count-windowed, not time-windowed: outcomes never expire by age
//! - One mutex around a `VecDeque`; eviction happens inside the same critical
//!   section as the append, so readers never see an over-capacity window
//! - Aggregates are computed under the lock, so a snapshot is never torn

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Outcome of a single completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    success: bool,
    timestamp: Instant,
}

impl CallOutcome {
    fn new(success: bool) -> Self {
        Self {
            success,
            timestamp: Instant::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// When the call completed.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// Consistent view of the window taken under a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowSnapshot {
    pub calls: usize,
    pub failed: usize,
}

impl WindowSnapshot {
    /// Failure rate in percent, `0.0` for an empty window.
    pub fn failure_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.failed as f64 / self.calls as f64 * 100.0
    }
}

/// Bounded FIFO of call outcomes, safe to share between threads.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    outcomes: Mutex<VecDeque<CallOutcome>>,
}

impl SlidingWindow {
    /// Create an empty window holding at most `capacity` outcomes.
    ///
    /// A capacity of zero is treated as one; configuration validation rejects
    /// it before a breaker is ever built.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            outcomes: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an outcome stamped with the current time, evicting the oldest
    /// entries until the window is back within capacity.
    pub fn record(&self, success: bool) {
        let mut outcomes = self.lock();
        outcomes.push_back(CallOutcome::new(success));
        while outcomes.len() > self.capacity {
            outcomes.pop_front();
        }
    }

    /// Record an outcome and return the aggregate that includes it.
    pub(crate) fn record_and_snapshot(&self, success: bool) -> WindowSnapshot {
        let mut outcomes = self.lock();
        outcomes.push_back(CallOutcome::new(success));
        while outcomes.len() > self.capacity {
            outcomes.pop_front();
        }
        Self::aggregate(&outcomes)
    }

    /// Failure rate over the retained outcomes, in percent.
    pub fn current_failure_rate(&self) -> f64 {
        self.snapshot().failure_rate()
    }

    /// Number of retained outcomes.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        Self::aggregate(&self.lock())
    }

    /// Copy of the retained outcomes, oldest first.
    pub fn outcomes(&self) -> Vec<CallOutcome> {
        self.lock().iter().copied().collect()
    }

    fn aggregate(outcomes: &VecDeque<CallOutcome>) -> WindowSnapshot {
        WindowSnapshot {
            calls: outcomes.len(),
            failed: outcomes.iter().filter(|o| !o.success).count(),
        }
    }

    // Every mutation completes before the guard drops, so a poisoned lock
    // still guards a consistent deque.
    fn lock(&self) -> MutexGuard<'_, VecDeque<CallOutcome>> {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
