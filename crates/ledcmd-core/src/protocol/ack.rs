//! Client-to-server acknowledgment tokens.
//!
//! After executing a command the client replies with a short text token.
//! The receiver treats the bytes it read as a NUL-terminated string: anything
//! after the first NUL byte is ignored, and invalid UTF-8 is replaced rather
//! than rejected.
//!
//! # Classification
//!
//! [`classify_ack`] is three-state: `On`, `Off`, or `Unrecognized`.  What an
//! unrecognized token *means* is a policy decision, see [`AckPolicy`].

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::led::LedState;

/// Token sent by the client after it switched its LED on.
pub const LED_ON_ACK: &str = "LED ON ACK";

/// Token sent by the client after it switched its LED off.
pub const LED_OFF_ACK: &str = "LED OFF ACK";

/// Maximum number of bytes read from the client per receive event.
pub const MAX_RECV_BUFFER_SIZE: usize = 20;

/// Meaning of one acknowledgment token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The client confirmed the LED is on.
    On,
    /// The client confirmed the LED is off.
    Off,
    /// Partial, corrupted, or unknown payload.
    Unrecognized,
}

/// How an [`Acknowledgement::Unrecognized`] token updates the confirmed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Only `"LED ON ACK"` means ON; every other token, recognized or not,
    /// counts as an OFF confirmation.  This is the behaviour deployed clients
    /// expect.
    #[default]
    TwoWay,
    /// Unrecognized tokens leave the confirmed state untouched.
    ThreeWay,
}

impl AckPolicy {
    /// Returns the confirmed state after receiving `ack` while `current` was
    /// confirmed.
    pub fn apply(self, ack: Acknowledgement, current: LedState) -> LedState {
        match (ack, self) {
            (Acknowledgement::On, _) => LedState::On,
            (Acknowledgement::Off, _) => LedState::Off,
            (Acknowledgement::Unrecognized, AckPolicy::TwoWay) => LedState::Off,
            (Acknowledgement::Unrecognized, AckPolicy::ThreeWay) => current,
        }
    }
}

/// Extracts the text token from a raw receive buffer.
///
/// The token ends at the first NUL byte (or at the end of the buffer).
pub fn ack_token(payload: &[u8]) -> Cow<'_, str> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end])
}

/// Classifies an acknowledgment token.
///
/// Comparison is exact: no trimming, no case folding.
pub fn classify_ack(token: &str) -> Acknowledgement {
    match token {
        LED_ON_ACK => Acknowledgement::On,
        LED_OFF_ACK => Acknowledgement::Off,
        other => {
            debug!(token = other, "unrecognized acknowledgment token");
            Acknowledgement::Unrecognized
        }
    }
}
