//! Button sources: where physical button edges come from.
//!
//! A button source calls [`ButtonInputDebouncer::on_edge`] once per raw
//! edge, from its own thread.  That thread plays the role of interrupt
//! context: it never blocks on the rest of the server and never waits for a
//! command to be sent.
//!
//! # Testability
//!
//! The [`ButtonSource`] trait lets the binary use [`stdin::StdinButton`]
//! while tests drive edges with explicit timestamps through
//! [`mock::MockButtonSource`].

use std::sync::Arc;

use thiserror::Error;

use crate::application::debouncer::ButtonInputDebouncer;

pub mod mock;
pub mod stdin;

/// Error type for button sources.
#[derive(Debug, Error)]
pub enum ButtonError {
    #[error("button source is already running")]
    AlreadyStarted,
    #[error("button source has not been started")]
    NotStarted,
    #[error("failed to spawn button input thread: {0}")]
    SpawnFailed(#[source] std::io::Error),
}

/// Producer of raw button edges.
pub trait ButtonSource: Send {
    /// Starts delivering edges to `debouncer`.
    fn start(&self, debouncer: Arc<ButtonInputDebouncer>) -> Result<(), ButtonError>;
    /// Stops delivering edges.
    fn stop(&self);
}
