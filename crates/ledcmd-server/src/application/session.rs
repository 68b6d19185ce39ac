//! ConnectionSession: the single active client connection.
//!
//! A [`Session`] owns the transport of one accepted, TLS-secured client and
//! the authoritative `confirmed_led_state`: the LED state the *client* last
//! acknowledged.  Sending a command never changes that state; only
//! [`Session::apply_acknowledgement`] does.
//!
//! Sessions are created and destroyed exclusively by the
//! [`ConnectionListener`](super::listener::ConnectionListener).  Other
//! contexts only ever hold a temporary `Arc<Session>` clone.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ledcmd_core::{
    classify_ack,
    protocol::{ack_token, MAX_RECV_BUFFER_SIZE},
    AckPolicy, Command, LedState, LedStateCell,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Failure of [`SessionTransport::send`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The peer closed the transport; the session is over.
    #[error("peer closed the connection")]
    PeerClosed,
    /// Any other failure; the session survives.
    #[error("send failed: {0}")]
    Other(String),
}

/// Failure of a receive on the session transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecvError {
    /// The peer closed the transport; the session is over.
    #[error("peer closed the connection")]
    PeerClosed,
    /// Any other failure; the session survives.
    #[error("receive failed: {0}")]
    Other(String),
}

/// Send capability of an accepted, secured connection.
///
/// Infrastructure implementations wrap a TLS stream; tests use recording
/// doubles.  Releasing the transport's resources ("delete") happens when the
/// last `Arc` is dropped.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Writes `bytes` to the peer and returns the number of bytes written.
    async fn send(&self, bytes: &[u8]) -> Result<usize, SendError>;

    /// Closes the transport.  Every later `send` must fail with
    /// [`SendError::PeerClosed`].
    async fn disconnect(&self);
}

/// Per-session receive settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How an unrecognized acknowledgment updates the confirmed state.
    pub ack_policy: AckPolicy,
    /// Maximum bytes considered per receive event.
    pub max_recv_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ack_policy: AckPolicy::default(),
            max_recv_buffer: MAX_RECV_BUFFER_SIZE,
        }
    }
}

/// The single active client connection.
pub struct Session {
    id: Uuid,
    peer_addr: SocketAddr,
    transport: Arc<dyn SessionTransport>,
    confirmed: LedStateCell,
    settings: SessionSettings,
}

impl Session {
    /// Creates a session with `confirmed_led_state = OFF`.
    pub(crate) fn new(
        peer_addr: SocketAddr,
        transport: Arc<dyn SessionTransport>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            transport,
            confirmed: LedStateCell::new(LedState::Off),
            settings,
        }
    }

    /// Identifier used to match transport events to this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address of the client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The LED state last confirmed by the client.
    pub fn confirmed_led_state(&self) -> LedState {
        self.confirmed.load()
    }

    /// The command the next trigger should send: the toggle of the confirmed state.
    pub fn next_command(&self) -> Command {
        Command::toggle_of(self.confirmed_led_state())
    }

    /// Sends `command` over the transport.  Does not touch the confirmed state.
    ///
    /// # Errors
    ///
    /// Propagates the transport's [`SendError`].
    pub async fn send_command(&self, command: Command) -> Result<usize, SendError> {
        self.transport.send(&command.encode()).await
    }

    /// Folds one received payload into the confirmed state and returns the new state.
    ///
    /// At most `max_recv_buffer` bytes are considered and the token ends at
    /// the first NUL byte.
    pub fn apply_acknowledgement(&self, payload: &[u8]) -> LedState {
        let payload = &payload[..payload.len().min(self.settings.max_recv_buffer)];
        let token = ack_token(payload);
        info!(session_id = %self.id, token = %token, "acknowledgement from client");

        let ack = classify_ack(&token);
        let current = self.confirmed.load();
        let next = self.settings.ack_policy.apply(ack, current);
        self.confirmed.replace(next);
        next
    }

    /// Closes the underlying transport.
    pub(crate) async fn close(&self) {
        self.transport.disconnect().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("confirmed", &self.confirmed_led_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        disconnects: Mutex<u32>,
    }

    #[async_trait]
    impl SessionTransport for RecordingTransport {
        async fn send(&self, bytes: &[u8]) -> Result<usize, SendError> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(bytes.len())
        }

        async fn disconnect(&self) {
            *self.disconnects.lock().unwrap() += 1;
        }
    }

    fn make_session(policy: AckPolicy) -> (Session, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let session = Session::new(
            "192.168.1.20:40000".parse().unwrap(),
            Arc::clone(&transport) as Arc<dyn SessionTransport>,
            SessionSettings {
                ack_policy: policy,
                max_recv_buffer: MAX_RECV_BUFFER_SIZE,
            },
        );
        (session, transport)
    }

    #[test]
    fn test_new_session_starts_confirmed_off() {
        let (session, _) = make_session(AckPolicy::TwoWay);
        assert_eq!(session.confirmed_led_state(), LedState::Off);
        assert_eq!(session.next_command(), Command::TurnOn);
    }

    #[tokio::test]
    async fn test_send_does_not_advance_confirmed_state() {
        // Arrange
        let (session, transport) = make_session(AckPolicy::TwoWay);

        // Act
        let written = session.send_command(Command::TurnOn).await.unwrap();

        // Assert
        assert_eq!(written, 1);
        assert_eq!(transport.sent.lock().unwrap().as_slice(), &[b"1".to_vec()]);
        assert_eq!(session.confirmed_led_state(), LedState::Off);
    }

    #[test]
    fn test_on_ack_confirms_on() {
        let (session, _) = make_session(AckPolicy::TwoWay);
        assert_eq!(session.apply_acknowledgement(b"LED ON ACK"), LedState::On);
        assert_eq!(session.next_command(), Command::TurnOff);
    }

    #[test]
    fn test_unrecognized_ack_is_off_under_two_way_policy() {
        let (session, _) = make_session(AckPolicy::TwoWay);
        session.apply_acknowledgement(b"LED ON ACK");

        assert_eq!(session.apply_acknowledgement(b"LED ?N"), LedState::Off);
    }

    #[test]
    fn test_unrecognized_ack_keeps_state_under_three_way_policy() {
        let (session, _) = make_session(AckPolicy::ThreeWay);
        session.apply_acknowledgement(b"LED ON ACK");

        assert_eq!(session.apply_acknowledgement(b"LED ?N"), LedState::On);
    }

    #[test]
    fn test_payload_longer_than_buffer_is_truncated() {
        // Arrange: the real token followed by enough padding to be cut off.
        let (session, _) = make_session(AckPolicy::TwoWay);
        let mut payload = b"LED ON ACK".to_vec();
        payload.resize(MAX_RECV_BUFFER_SIZE + 10, b'x');

        // Act / Assert: the truncated prefix is still not the exact token.
        assert_eq!(session.apply_acknowledgement(&payload), LedState::Off);
    }

    #[test]
    fn test_nul_terminated_ack_is_recognized() {
        let (session, _) = make_session(AckPolicy::TwoWay);
        assert_eq!(session.apply_acknowledgement(b"LED ON ACK\0\0\0"), LedState::On);
    }

    #[tokio::test]
    async fn test_close_disconnects_transport() {
        let (session, transport) = make_session(AckPolicy::TwoWay);
        session.close().await;
        assert_eq!(*transport.disconnects.lock().unwrap(), 1);
    }
}
