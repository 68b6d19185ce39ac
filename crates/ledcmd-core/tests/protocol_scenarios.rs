//! Integration tests for the ledcmd-core protocol types.
//!
//! These tests drive the command codec and the acknowledgment classifier
//! together through the public API, the same way the server's dispatcher and
//! receive path use them: derive a command from the confirmed state, then
//! fold the client's reply back into the confirmed state.

use ledcmd_core::{
    classify_ack,
    protocol::{ack_token, MAX_RECV_BUFFER_SIZE},
    AckPolicy, Command, LedState, LED_OFF_ACK, LED_ON_ACK,
};
use serde::Deserialize;

/// Simulates one button press followed by the client's reply.
fn press_and_reply(confirmed: LedState, reply: &[u8], policy: AckPolicy) -> (Command, LedState) {
    let command = Command::toggle_of(confirmed);
    let ack = classify_ack(&ack_token(reply));
    (command, policy.apply(ack, confirmed))
}

#[test]
fn test_full_toggle_cycle_alternates_commands() {
    // Arrange
    let policy = AckPolicy::TwoWay;
    let mut confirmed = LedState::Off;

    // Act: press, client acks ON; press, client acks OFF.
    let (first, after_first) = press_and_reply(confirmed, LED_ON_ACK.as_bytes(), policy);
    confirmed = after_first;
    let (second, after_second) = press_and_reply(confirmed, LED_OFF_ACK.as_bytes(), policy);

    // Assert
    assert_eq!(first.encode(), [b'1']);
    assert_eq!(after_first, LedState::On);
    assert_eq!(second.encode(), [b'0']);
    assert_eq!(after_second, LedState::Off);
}

#[test]
fn test_missing_acknowledgment_repeats_the_same_command() {
    // No reply is folded in between the two presses.
    let confirmed = LedState::Off;

    let first = Command::toggle_of(confirmed);
    let second = Command::toggle_of(confirmed);

    assert_eq!(first, Command::TurnOn);
    assert_eq!(first, second);
}

#[test]
fn test_corrupted_reply_policies_disagree() {
    let garbage = b"LED O\xFFN";

    let (_, two_way) = press_and_reply(LedState::On, garbage, AckPolicy::TwoWay);
    let (_, three_way) = press_and_reply(LedState::On, garbage, AckPolicy::ThreeWay);

    assert_eq!(two_way, LedState::Off);
    assert_eq!(three_way, LedState::On);
}

#[test]
fn test_nul_terminated_reply_is_recognized() {
    let mut buffer = [0u8; MAX_RECV_BUFFER_SIZE];
    buffer[..LED_ON_ACK.len()].copy_from_slice(LED_ON_ACK.as_bytes());

    let (_, confirmed) = press_and_reply(LedState::Off, &buffer, AckPolicy::ThreeWay);

    assert_eq!(confirmed, LedState::On);
}

#[test]
fn test_every_command_encodes_to_a_single_ascii_digit() {
    for command in [Command::TurnOn, Command::TurnOff] {
        let wire = command.encode();
        assert_eq!(wire.len(), 1);
        assert!(wire[0].is_ascii_digit());
    }
}

#[test]
fn test_ack_policy_parses_from_toml() {
    #[derive(Deserialize)]
    struct Section {
        ack_policy: AckPolicy,
    }

    let two: Section = toml::from_str(r#"ack_policy = "two_way""#).expect("parse two_way");
    let three: Section = toml::from_str(r#"ack_policy = "three_way""#).expect("parse three_way");

    assert_eq!(two.ack_policy, AckPolicy::TwoWay);
    assert_eq!(three.ack_policy, AckPolicy::ThreeWay);
}
