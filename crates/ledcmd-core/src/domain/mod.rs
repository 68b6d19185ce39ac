//! Domain entities for the LED command server.
//!
//! This module contains pure state with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the application is called the **domain**.  Domain
//! code has no imports from OS APIs, network libraries, or hardware drivers,
//! and can be compiled and tested on any platform.  Everything that touches a
//! socket or a GPIO pin lives in the server crate and depends on this module,
//! never the other way round.

/// Timing rule that turns raw button edges into toggle requests.
pub mod debounce;

/// The LED state confirmed by the client, and its lock-free cell.
pub mod led;
