//! # ledcmd-core
//!
//! Shared library for the LED command server containing the one-byte wire
//! command codec, the acknowledgment classifier, and the domain types that
//! describe the LED and the button debounce window.
//!
//! It has zero dependencies on OS APIs or network sockets, so every rule in
//! here can be tested on any host.
//!
//! # Architecture overview (for beginners)
//!
//! The server sends a single ASCII byte to its one connected client every time
//! the operator presses a button: `'1'` asks the client to turn its LED on,
//! `'0'` asks it to turn the LED off.  The client answers with a short text
//! token such as `"LED ON ACK"`.  The server only believes the LED changed
//! once that acknowledgment arrives.
//!
//! - **`protocol`** – How bytes travel over the wire: the [`Command`] byte
//!   sent by the server and the acknowledgment tokens sent back by the client.
//!
//! - **`domain`** – Pure state: the [`LedState`] the server believes is
//!   confirmed, and the [`DebounceWindow`] that turns a noisy button into
//!   clean toggle requests.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `ledcmd_core::Command` instead of `ledcmd_core::protocol::command::Command`.
pub use domain::debounce::{DebounceWindow, DEBOUNCE_TIME_MS};
pub use domain::led::{LedState, LedStateCell};
pub use protocol::ack::{classify_ack, Acknowledgement, AckPolicy, LED_OFF_ACK, LED_ON_ACK};
pub use protocol::command::Command;
