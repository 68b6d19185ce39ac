//! One-byte codec for server-to-client LED commands.
//!
//! Wire format:
//! ```text
//! [command:1]     '1' = turn the LED on, '0' = turn the LED off
//! ```
//! There is no header, no length prefix and no terminator.  One TCP send
//! carries exactly one command byte.
//!
//! The server only ever encodes; parsing command bytes is the client's job.

use std::fmt;

use crate::domain::led::LedState;

/// Wire byte asking the client to turn its LED on.
pub const LED_ON_CMD: u8 = b'1';

/// Wire byte asking the client to turn its LED off.
pub const LED_OFF_CMD: u8 = b'0';

/// Length of an encoded command in bytes.
pub const COMMAND_LEN: usize = 1;

/// An LED command sent from the server to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Ask the client to switch its LED on.
    TurnOn,
    /// Ask the client to switch its LED off.
    TurnOff,
}

impl Command {
    /// The command that moves the LED *away* from `confirmed`.
    ///
    /// This is the only way the dispatcher derives a command: always from the
    /// last state the client acknowledged, never from the last command sent.
    pub fn toggle_of(confirmed: LedState) -> Self {
        Self::to_reach(confirmed.toggled())
    }

    /// The command that moves the LED to `target`.
    pub fn to_reach(target: LedState) -> Self {
        match target {
            LedState::On => Command::TurnOn,
            LedState::Off => Command::TurnOff,
        }
    }

    /// The ASCII byte carried on the wire.
    pub fn wire_byte(self) -> u8 {
        match self {
            Command::TurnOn => LED_ON_CMD,
            Command::TurnOff => LED_OFF_CMD,
        }
    }

    /// Encodes the command into its wire form.
    pub fn encode(self) -> [u8; COMMAND_LEN] {
        [self.wire_byte()]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::TurnOn => f.write_str("LED ON"),
            Command::TurnOff => f.write_str("LED OFF"),
        }
    }
}
