//! LED state as confirmed by the remote client.
//!
//! The server never *observes* the LED directly.  It only knows what the
//! client last acknowledged, so [`LedState`] always means "confirmed state"
//! and never "last state we asked for".

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// The two states of the client's LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LedState {
    /// The LED is off.  Every new session starts here.
    #[default]
    Off,
    /// The LED is on.
    On,
}

impl LedState {
    /// Returns the opposite state.
    pub fn toggled(self) -> Self {
        match self {
            LedState::Off => LedState::On,
            LedState::On => LedState::Off,
        }
    }

    /// Returns `true` for [`LedState::On`].
    pub fn is_on(self) -> bool {
        self == LedState::On
    }
}

impl From<bool> for LedState {
    fn from(on: bool) -> Self {
        if on {
            LedState::On
        } else {
            LedState::Off
        }
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedState::Off => f.write_str("OFF"),
            LedState::On => f.write_str("ON"),
        }
    }
}

/// A lock-free cell holding a [`LedState`].
///
/// The receive path writes it and the dispatcher task reads it, possibly on
/// different threads at the same time.  A single `AtomicBool` is enough:
/// there is exactly one writer per session and the value is never combined
/// with other state in a read-modify-write.
#[derive(Debug, Default)]
pub struct LedStateCell {
    on: AtomicBool,
}

impl LedStateCell {
    /// Creates a cell holding `initial`.
    pub fn new(initial: LedState) -> Self {
        Self {
            on: AtomicBool::new(initial.is_on()),
        }
    }

    /// Reads the current state.
    pub fn load(&self) -> LedState {
        LedState::from(self.on.load(Ordering::Acquire))
    }

    /// Stores `state` and returns the previous value.
    pub fn replace(&self, state: LedState) -> LedState {
        LedState::from(self.on.swap(state.is_on(), Ordering::AcqRel))
    }
}
