//! CommandDispatcher: turns pending triggers into LED commands.
//!
//! # The command/acknowledgment protocol (for beginners)
//!
//! The server never assumes a command worked.  It keeps the LED state the
//! *client* last confirmed and always sends the opposite of that:
//!
//! ```text
//! confirmed OFF ── trigger ──► send '1' ── client replies "LED ON ACK" ──► confirmed ON
//! confirmed ON  ── trigger ──► send '0' ── client replies anything else ──► confirmed OFF
//! ```
//!
//! If the acknowledgment never arrives, the confirmed state does not move and
//! the next trigger simply resends the same command.
//!
//! The dispatcher is the only consumer of the [`NotificationChannel`] and the
//! only context that waits indefinitely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ledcmd_core::Command;
use tracing::{debug, error, info};

use super::listener::{ConnectionListener, TeardownReason};
use super::notification::NotificationChannel;
use super::session::SendError;

/// Result of handling one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No client is connected; the trigger was discarded.
    NoSession,
    /// The command was written to the client.
    Sent(Command),
    /// The peer closed the transport; the session was torn down.
    PeerClosed,
    /// The send failed for another reason; the session is unchanged.
    SendFailed,
}

/// Single consumer of the trigger channel.
pub struct CommandDispatcher {
    channel: Arc<NotificationChannel>,
    listener: Arc<ConnectionListener>,
}

impl CommandDispatcher {
    pub fn new(channel: Arc<NotificationChannel>, listener: Arc<ConnectionListener>) -> Self {
        Self { channel, listener }
    }

    /// Sends the toggle of the confirmed state to the active session.
    ///
    /// Does not wait for a trigger; [`run`](Self::run) does that.
    pub async fn dispatch_once(&self) -> DispatchOutcome {
        // Clone the Arc so the session lock is released before the send.
        let Some(session) = self.listener.active_session() else {
            debug!("trigger discarded: no client connected");
            return DispatchOutcome::NoSession;
        };

        let command = session.next_command();
        match session.send_command(command).await {
            Ok(_) => {
                info!(session_id = %session.id(), %command, "sent {command} command to TCP client");
                DispatchOutcome::Sent(command)
            }
            Err(SendError::PeerClosed) => {
                error!(session_id = %session.id(), %command, error = %SendError::PeerClosed, "failed to send command to TCP client");
                self.listener
                    .teardown(session.id(), TeardownReason::SendPeerClosed)
                    .await;
                DispatchOutcome::PeerClosed
            }
            Err(err @ SendError::Other(_)) => {
                error!(session_id = %session.id(), %command, error = %err, "failed to send command to TCP client");
                DispatchOutcome::SendFailed
            }
        }
    }

    /// Waits for a trigger and dispatches it, until `running` is cleared.
    ///
    /// The flag is checked after each trigger, so a caller that wants a
    /// prompt exit should also race this future against its shutdown signal.
    pub async fn run(&self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            self.channel.wait().await;
            self.dispatch_once().await;
        }
        debug!("command dispatcher stopped");
    }
}
