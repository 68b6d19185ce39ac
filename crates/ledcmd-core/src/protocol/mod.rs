//! Protocol module containing the command encoder and the acknowledgment classifier.

pub mod ack;
pub mod command;

pub use ack::{ack_token, classify_ack, Acknowledgement, AckPolicy, MAX_RECV_BUFFER_SIZE};
pub use command::{Command, COMMAND_LEN, LED_OFF_CMD, LED_ON_CMD};
