//! ButtonInputDebouncer: turns raw button edges into toggle triggers.
//!
//! Runs in interrupt context.  Every path through [`ButtonInputDebouncer::on_edge`]
//! is a handful of atomic operations: no allocation, no lock, no logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ledcmd_core::DebounceWindow;

use super::notification::{NotificationChannel, PublishOutcome};

/// What happened to one physical edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// The edge fell inside the debounce window.
    Ignored,
    /// The edge was accepted but a trigger was already pending.
    Dropped,
    /// The edge was accepted and a trigger is now pending.
    Triggered,
}

impl EdgeOutcome {
    /// Whether the caller should yield back to the scheduler so the woken
    /// dispatcher gets to run.
    pub fn should_yield(self) -> bool {
        self == EdgeOutcome::Triggered
    }
}

/// Debounces button edges and publishes triggers into the [`NotificationChannel`].
pub struct ButtonInputDebouncer {
    window: DebounceWindow,
    channel: Arc<NotificationChannel>,
    epoch: Instant,
}

impl ButtonInputDebouncer {
    /// Creates a debouncer with the given window that publishes into `channel`.
    pub fn new(threshold: Duration, channel: Arc<NotificationChannel>) -> Self {
        Self {
            window: DebounceWindow::new(threshold),
            channel,
            epoch: Instant::now(),
        }
    }

    /// Handles an edge observed now.
    pub fn on_edge(&self) -> EdgeOutcome {
        let now_ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.on_edge_at(now_ms)
    }

    /// Handles an edge observed at `now_ms` milliseconds after start-up.
    pub fn on_edge_at(&self, now_ms: u64) -> EdgeOutcome {
        if !self.window.try_open(now_ms) {
            return EdgeOutcome::Ignored;
        }

        let outcome = match self.channel.publish() {
            PublishOutcome::Published => EdgeOutcome::Triggered,
            PublishOutcome::Dropped => EdgeOutcome::Dropped,
        };

        // Disarm eagerly; the next edge is measured against `now_ms`.
        self.window.close();
        outcome
    }

    /// The debounce window, for diagnostics.
    pub fn window(&self) -> &DebounceWindow {
        &self.window
    }
}
