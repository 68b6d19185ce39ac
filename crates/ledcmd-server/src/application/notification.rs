//! NotificationChannel: single-slot, lossy handoff from the button to the dispatcher.
//!
//! # Why not a queue? (for beginners)
//!
//! Only the fact "the operator asked for a toggle" matters, never how many
//! times they asked.  If triggers were queued, a burst of presses while the
//! client is slow would turn into a burst of commands once it catches up.
//! Instead the channel holds at most **one** pending trigger:
//!
//! ```text
//! publish()  slot empty  ──►  slot full, consumer woken      (Published)
//! publish()  slot full   ──►  nothing changes                (Dropped)
//! wait()     slot full   ──►  slot empty, returns at once
//! wait()     slot empty  ──►  suspends until the next publish
//! ```
//!
//! A second trigger is dropped, never overwrites the first, and is never
//! queued behind it.
//!
//! # Contexts
//!
//! [`NotificationChannel::publish`] is called from interrupt context (the
//! button thread on the host), must never block, and never fails.
//! [`NotificationChannel::wait`] is called by exactly one consumer, the
//! dispatcher task.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Result of [`NotificationChannel::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The slot was empty; the trigger is now pending and the consumer was woken.
    Published,
    /// A trigger was already pending; this one was discarded.
    Dropped,
}

/// Single-slot, at-most-one-pending trigger channel.
#[derive(Debug, Default)]
pub struct NotificationChannel {
    pending: AtomicBool,
    wake: Notify,
}

impl NotificationChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a trigger if the slot is empty, otherwise drops it.
    pub fn publish(&self) -> PublishOutcome {
        match self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // `notify_one` stores a permit when the consumer is not
                // waiting yet, so the wake-up cannot be lost.
                self.wake.notify_one();
                PublishOutcome::Published
            }
            Err(_) => PublishOutcome::Dropped,
        }
    }

    /// Takes the pending trigger without waiting.  Returns `true` if one was pending.
    pub fn try_take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Returns `true` while a trigger is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Suspends until a trigger is available, then consumes it.
    pub async fn wait(&self) {
        loop {
            let notified = self.wake.notified();
            if self.try_take() {
                return;
            }
            notified.await;
        }
    }
}
