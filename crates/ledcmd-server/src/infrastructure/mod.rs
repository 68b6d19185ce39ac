//! Infrastructure layer of the LED command server.
//!
//! Contains OS-facing adapters: link bring-up, the TLS socket server, button
//! sources, and configuration file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `ledcmd_core`, but MUST NOT be imported by the `application` layer.

pub mod button_input;
pub mod link;
pub mod network;
pub mod storage;
