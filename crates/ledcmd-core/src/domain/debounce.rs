//! Debounce window for the operator button.
//!
//! # What is debouncing? (for beginners)
//!
//! A mechanical push button does not switch cleanly.  For a few milliseconds
//! after it is pressed the contacts bounce, and the interrupt controller sees
//! a burst of edges instead of one.  A *debouncer* accepts the first edge and
//! ignores every edge that follows within a fixed time window.
//!
//! # The rule implemented here
//!
//! - The first edge ever seen is accepted.
//! - Any later edge is accepted only when at least `threshold_ms` have passed
//!   since the **last accepted** edge.  Ignored edges do not move the window.
//! - While an accepted edge is being processed the window is *armed*; a
//!   concurrent edge arriving during that moment is ignored outright.  The
//!   caller disarms the window with [`DebounceWindow::close`] right after it
//!   has published the trigger.
//!
//! # Thread safety
//!
//! The window is touched from interrupt context, so it must never block.  It
//! uses two atomics: `armed` is claimed with a single `swap`, which makes two
//! simultaneous edges race for it, and exactly one of them wins.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Minimum time between two accepted button edges, in milliseconds.
pub const DEBOUNCE_TIME_MS: u64 = 100;

/// Sentinel for "no edge accepted yet".
const NEVER: u64 = u64::MAX;

/// Timestamp of the last accepted edge plus an "armed" flag.
#[derive(Debug)]
pub struct DebounceWindow {
    threshold_ms: u64,
    last_accepted_ms: AtomicU64,
    armed: AtomicBool,
}

impl DebounceWindow {
    /// Creates a window with the given threshold.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold_ms: u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX),
            last_accepted_ms: AtomicU64::new(NEVER),
            armed: AtomicBool::new(false),
        }
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    /// Tries to open the window for an edge observed at `now_ms`.
    ///
    /// Returns `true` when the edge is accepted.  The window is then armed
    /// and `now_ms` becomes the new reference timestamp; the caller must call
    /// [`close`](Self::close) once the trigger has been published.
    ///
    /// Returns `false` when the edge must be ignored, either because another
    /// edge is being processed right now or because the previous accepted
    /// edge is too recent.
    pub fn try_open(&self, now_ms: u64) -> bool {
        if self.armed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let last = self.last_accepted_ms.load(Ordering::Acquire);
        let elapsed_enough = last == NEVER || now_ms.saturating_sub(last) >= self.threshold_ms;
        if !elapsed_enough {
            self.armed.store(false, Ordering::Release);
            return false;
        }

        self.last_accepted_ms.store(now_ms, Ordering::Release);
        true
    }

    /// Disarms the window after an accepted edge has been handled.
    pub fn close(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Returns `true` while an accepted edge is being processed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Timestamp of the last accepted edge, if any.
    pub fn last_accepted_ms(&self) -> Option<u64> {
        match self.last_accepted_ms.load(Ordering::Acquire) {
            NEVER => None,
            ms => Some(ms),
        }
    }
}

impl Default for DebounceWindow {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEBOUNCE_TIME_MS))
    }
}
