//! Application layer of the LED command server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the pure rules in `ledcmd_core` and
//! the infrastructure (sockets, TLS, threads, files).  Code here:
//!
//! - **Orchestrates** the core types to fulfil the server's job: "when the
//!   operator presses the button, tell the client to toggle its LED".
//! - **Depends on abstractions** (the [`session::SessionTransport`] trait)
//!   rather than on TLS streams, so every use case runs in unit tests.
//! - **Performs no I/O of its own**.
//!
//! # Data flow
//!
//! ```text
//! button edge ─► debouncer ─► notification ─► dispatch ─► session.send_command
//!                                                            │
//! transport events ─► listener.on_receive / on_disconnect ◄──┘ (acks)
//! ```
//!
//! # Sub-modules
//!
//! - **`notification`** – single-slot, lossy trigger channel.
//! - **`debouncer`**    – filters bouncing edges and publishes triggers.
//! - **`session`**      – the single client connection and its confirmed LED state.
//! - **`listener`**     – session lifecycle state machine.
//! - **`dispatch`**     – consumes triggers and sends commands.

pub mod debouncer;
pub mod dispatch;
pub mod listener;
pub mod notification;
pub mod session;
