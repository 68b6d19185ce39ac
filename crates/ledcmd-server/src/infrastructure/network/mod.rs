//! Network infrastructure for the LED command server.
//!
//! # Sub-modules
//!
//! - **`tls`** – Loads the server certificate, private key and client CA and
//!   builds the mutual-TLS acceptor.  A client without a certificate signed
//!   by the configured CA cannot complete the handshake.
//!
//! - **`server`** – Binds the listening socket, runs the accept loop, and
//!   spawns one read task per accepted session.  Implements the
//!   `SessionTransport` trait on top of the TLS write half so the
//!   application layer never touches a socket.

pub mod server;
pub mod tls;
