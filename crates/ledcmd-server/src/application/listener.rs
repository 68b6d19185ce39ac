//! ConnectionListener: owns the session lifecycle of the single-client server.
//!
//! # State machine
//!
//! ```text
//!              begin_accept()             AcceptPermit::complete()
//! Listening ─────────────────► Accepting ─────────────────────────► SessionActive
//!     ▲                           │                                     │
//!     │   AcceptPermit::fail()    │       disconnect / peer closed      │
//!     ├───────────────────────────┘                                     ▼
//!     └──────────────────────────────────────────────────────── Disconnecting
//! ```
//!
//! - Only `Listening` accepts a new connect request.  In every other state
//!   [`ConnectionListener::begin_accept`] fails with [`ListenerError::Busy`]
//!   and the transport adapter must reject the connection itself.
//! - At most one [`Session`] exists at any time.
//! - Events are keyed by session id.  An event for a session that has
//!   already been torn down is ignored.
//!
//! The listener state and the session pointer live behind one
//! `std::sync::Mutex` that is only held for pointer-sized updates, never
//! across an `.await`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ledcmd_core::LedState;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::session::{RecvError, Session, SessionSettings, SessionTransport};

/// Lifecycle state of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Bound and listening; no session.
    Listening,
    /// A connect request is being accepted (TLS handshake in progress).
    Accepting,
    /// A session is active and receives commands.
    SessionActive,
    /// The active session is being torn down.
    Disconnecting,
}

/// Error returned when the listener cannot take a new connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenerError {
    #[error("listener is busy ({0:?}); only one client session is supported")]
    Busy(ListenerState),
}

/// Failure while accepting a connect request.  Never fatal.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The TCP accept itself failed.
    #[error("failed to accept incoming client connection: {0}")]
    Accept(#[source] std::io::Error),
    /// The TLS handshake completed with an error.
    #[error("TLS handshake with {peer} failed: {source}")]
    Tls {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The TLS handshake did not finish within the receive timeout.
    #[error("TLS handshake with {peer} timed out after {timeout:?}")]
    TimedOut { peer: SocketAddr, timeout: Duration },
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The transport reported a disconnect event.
    Disconnected,
    /// A receive failed because the peer closed the transport.
    ReceivePeerClosed,
    /// A send failed because the peer closed the transport.
    SendPeerClosed,
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TeardownReason::Disconnected => "client disconnected",
            TeardownReason::ReceivePeerClosed => "peer closed the connection during receive",
            TeardownReason::SendPeerClosed => "peer closed the connection during send",
            TeardownReason::Shutdown => "server shutting down",
        };
        f.write_str(text)
    }
}

/// What a receive event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The payload was classified; the confirmed state is now the given value.
    Confirmed(LedState),
    /// A non-fatal receive error; the session is unchanged.
    Ignored,
    /// The peer closed the transport and the session was torn down.
    TornDown,
    /// The event belongs to a session that no longer exists.
    StaleSession,
}

struct Inner {
    state: ListenerState,
    session: Option<Arc<Session>>,
}

/// Owns the single session and the listening lifecycle.
pub struct ConnectionListener {
    inner: Mutex<Inner>,
    listen_port: u16,
    settings: SessionSettings,
}

impl ConnectionListener {
    /// Creates a listener in the `Listening` state.
    ///
    /// `listen_port` is only used in operator log lines.
    pub fn new(listen_port: u16, settings: SessionSettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ListenerState::Listening,
                session: None,
            }),
            listen_port,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves `Inner` consistent, so a poisoned
        // lock still holds valid data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        self.lock().state
    }

    /// The active session, if any.  The returned `Arc` keeps the transport
    /// alive for the caller even if the session is torn down concurrently.
    pub fn active_session(&self) -> Option<Arc<Session>> {
        self.lock().session.clone()
    }

    /// Logs the operator line announcing the listening port.
    pub fn announce_listening(&self) {
        info!("===============================================================");
        info!(
            port = self.listen_port,
            "listening for incoming TCP client connection on port {}", self.listen_port
        );
    }

    /// Handles a connect request: `Listening → Accepting`.
    ///
    /// The returned permit must be settled with [`AcceptPermit::complete`] or
    /// [`AcceptPermit::fail`]; dropping it unsettled returns the listener to
    /// `Listening`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Busy`] when the listener is not `Listening`.
    pub fn begin_accept(&self) -> Result<AcceptPermit<'_>, ListenerError> {
        let mut inner = self.lock();
        if inner.state != ListenerState::Listening {
            return Err(ListenerError::Busy(inner.state));
        }
        inner.state = ListenerState::Accepting;
        Ok(AcceptPermit {
            listener: self,
            settled: false,
        })
    }

    fn install_session(&self, peer_addr: SocketAddr, transport: Arc<dyn SessionTransport>) -> Arc<Session> {
        let session = Arc::new(Session::new(peer_addr, transport, self.settings));
        {
            let mut inner = self.lock();
            inner.session = Some(Arc::clone(&session));
            inner.state = ListenerState::SessionActive;
        }
        info!(session_id = %session.id(), peer = %peer_addr, "incoming TCP connection accepted");
        info!("TLS handshake successful and communication secured");
        prompt_operator();
        session
    }

    fn abandon_accept(&self) {
        let mut inner = self.lock();
        if inner.state == ListenerState::Accepting {
            inner.state = ListenerState::Listening;
        }
    }

    /// Handles a receive event for `session_id`.
    pub async fn on_receive(
        &self,
        session_id: Uuid,
        result: Result<Vec<u8>, RecvError>,
    ) -> ReceiveOutcome {
        let Some(session) = self.session_if_current(session_id) else {
            return ReceiveOutcome::StaleSession;
        };

        let outcome = match result {
            Ok(payload) => {
                let confirmed = session.apply_acknowledgement(&payload);
                info!(session_id = %session_id, led_state = %confirmed, "LED state confirmed by client");
                ReceiveOutcome::Confirmed(confirmed)
            }
            Err(RecvError::PeerClosed) => {
                error!(session_id = %session_id, error = %RecvError::PeerClosed, "failed to receive acknowledgement from client");
                self.teardown(session_id, TeardownReason::ReceivePeerClosed).await;
                return ReceiveOutcome::TornDown;
            }
            Err(err @ RecvError::Other(_)) => {
                error!(session_id = %session_id, error = %err, "failed to receive acknowledgement from client");
                ReceiveOutcome::Ignored
            }
        };

        prompt_operator();
        outcome
    }

    /// Handles a disconnect event for `session_id`.
    ///
    /// Returns `true` if the session was torn down by this call.
    pub async fn on_disconnect(&self, session_id: Uuid) -> bool {
        self.teardown(session_id, TeardownReason::Disconnected).await
    }

    /// Tears down the session `session_id` and returns to `Listening`.
    ///
    /// Returns `false` without side effects when `session_id` is not the
    /// active session (already torn down, or replaced).
    ///
    /// The operator is asked to reconnect the client, and the listening port
    /// is announced again, unless `reason` is [`TeardownReason::Shutdown`]:
    /// a stopping server is not waiting for anyone.
    pub async fn teardown(&self, session_id: Uuid, reason: TeardownReason) -> bool {
        let session = {
            let mut inner = self.lock();
            match inner.session.as_ref() {
                Some(active) if active.id() == session_id => {}
                _ => return false,
            }
            inner.state = ListenerState::Disconnecting;
            inner.session.take()
        };

        let shutting_down = reason == TeardownReason::Shutdown;
        if let Some(session) = session {
            session.close().await;
            if shutting_down {
                info!(session_id = %session_id, peer = %session.peer_addr(), "client session closed for shutdown");
            } else {
                warn!(
                    session_id = %session_id,
                    peer = %session.peer_addr(),
                    %reason,
                    "TCP client disconnected; please reconnect the client"
                );
            }
        }

        self.lock().state = ListenerState::Listening;
        if !shutting_down {
            self.announce_listening();
        }
        true
    }

    /// Tears down whatever session is active.  Used on shutdown.
    pub async fn shutdown(&self) {
        if let Some(session) = self.active_session() {
            self.teardown(session.id(), TeardownReason::Shutdown).await;
        }
    }

    fn session_if_current(&self, session_id: Uuid) -> Option<Arc<Session>> {
        self.lock()
            .session
            .as_ref()
            .filter(|s| s.id() == session_id)
            .cloned()
    }
}

fn prompt_operator() {
    info!("press the user button to send LED ON/OFF command to the TCP client");
}

/// Proof that the listener is in `Accepting` on behalf of one connect request.
#[must_use = "an unsettled permit leaves the listener in Accepting until dropped"]
pub struct AcceptPermit<'a> {
    listener: &'a ConnectionListener,
    settled: bool,
}

impl AcceptPermit<'_> {
    /// Handshake succeeded: creates the session and moves to `SessionActive`.
    pub fn complete(mut self, peer_addr: SocketAddr, transport: Arc<dyn SessionTransport>) -> Arc<Session> {
        self.settled = true;
        self.listener.install_session(peer_addr, transport)
    }

    /// Handshake failed: logs and returns to `Listening`.  The peer must reconnect.
    pub fn fail(mut self, error: &HandshakeError) {
        self.settled = true;
        error!(%error, "failed to accept incoming client connection");
        self.listener.abandon_accept();
        self.listener.announce_listening();
    }
}

impl Drop for AcceptPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.listener.abandon_accept();
        }
    }
}
