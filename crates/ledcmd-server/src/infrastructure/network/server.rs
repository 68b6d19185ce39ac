//! TLS command server: accept loop, per-session read loop and the TLS transport.
//!
//! # Task layout
//!
//! ```text
//! accept task (TlsServer::serve)
//!   ├─ TCP accept
//!   ├─ ConnectionListener::begin_accept     (Busy → connection dropped)
//!   ├─ TLS handshake, bounded by handshake_timeout
//!   ├─ AcceptPermit::complete → Session
//!   └─ spawn read task (read_loop)
//!        ├─ read ≤ max_recv bytes → ConnectionListener::on_receive
//!        ├─ EOF                   → ConnectionListener::on_disconnect
//!        └─ exits on teardown (transport shutdown signal)
//! ```
//!
//! The stream is split into halves: the read half belongs to the read task,
//! the write half to [`TlsTransport`], which the session uses for commands.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::listener::{ConnectionListener, HandshakeError, ReceiveOutcome};
use crate::application::session::{RecvError, SendError, SessionTransport};

use super::tls::SecureContext;

/// A receive error that repeats this many times in a row is treated as a
/// closed peer, so a dead socket cannot spin the read task forever.
pub const MAX_CONSECUTIVE_RECV_ERRORS: u32 = 8;

/// Upper bound for the graceful TLS close in [`TlsTransport::disconnect`].
/// A peer that stops reading must not hold up teardown.
pub const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// First delay after a failed TCP accept.
const ACCEPT_RETRY_BASE: Duration = Duration::from_millis(100);

/// Longest delay between accept retries.
const ACCEPT_RETRY_MAX: Duration = Duration::from_secs(2);

/// Delay before the next accept after `consecutive_failures` failures in a row.
///
/// Doubles from [`ACCEPT_RETRY_BASE`] and saturates at [`ACCEPT_RETRY_MAX`], so
/// a persistent error (for example `EMFILE`) cannot spin the accept task.
pub fn accept_retry_delay(consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(16);
    ACCEPT_RETRY_BASE
        .saturating_mul(1u32 << exponent)
        .min(ACCEPT_RETRY_MAX)
}

/// Error type for setting up the listening socket.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("listen failed on {addr}: {source}")]
    ListenFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Socket-level settings of the command server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address and port to listen on.
    pub listen_addr: SocketAddr,
    /// Listen backlog (maximum pending connections).
    pub backlog: u32,
    /// Upper bound for the TLS handshake of one connect request.
    pub handshake_timeout: Duration,
    /// Maximum bytes read per receive event.
    pub max_recv_buffer: usize,
}

/// Listening TLS server feeding a [`ConnectionListener`].
pub struct TlsServer {
    tcp: TcpListener,
    secure: SecureContext,
    sessions: Arc<ConnectionListener>,
    settings: ServerSettings,
}

impl TlsServer {
    /// Binds and listens on `settings.listen_addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the socket cannot be created, bound, or put
    /// into the listening state.
    pub fn bind(
        settings: ServerSettings,
        secure: SecureContext,
        sessions: Arc<ConnectionListener>,
    ) -> Result<Self, ServerError> {
        let addr = settings.listen_addr;
        let bind_err = |source| ServerError::BindFailed { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let tcp = socket
            .listen(settings.backlog)
            .map_err(|source| ServerError::ListenFailed { addr, source })?;

        Ok(Self {
            tcp,
            secure,
            sessions,
            settings,
        })
    }

    /// The address actually bound (useful when the configured port is 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Accepts connections forever.  Accept and handshake failures are logged
    /// and never end the loop.  Repeated accept failures back off, see
    /// [`accept_retry_delay`].
    pub async fn serve(&self) {
        let mut accept_failures = 0u32;
        loop {
            let (tcp, peer) = match self.tcp.accept().await {
                Ok(accepted) => {
                    accept_failures = 0;
                    accepted
                }
                Err(e) => {
                    accept_failures = accept_failures.saturating_add(1);
                    let delay = accept_retry_delay(accept_failures);
                    error!(
                        error = %HandshakeError::Accept(e),
                        failures = accept_failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "TCP accept failed"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let permit = match self.sessions.begin_accept() {
                Ok(permit) => permit,
                Err(err) => {
                    warn!(%peer, %err, "rejecting connect request");
                    drop(tcp);
                    continue;
                }
            };

            let handshake = timeout(self.settings.handshake_timeout, self.secure.acceptor().accept(tcp));
            match handshake.await {
                Ok(Ok(stream)) => {
                    let (reader, writer) = tokio::io::split(stream);
                    let shutdown = Arc::new(Notify::new());
                    let transport = Arc::new(TlsTransport::new(writer, Arc::clone(&shutdown)));
                    let session = permit.complete(peer, transport);

                    tokio::spawn(read_loop(
                        Arc::clone(&self.sessions),
                        session.id(),
                        reader,
                        shutdown,
                        self.settings.max_recv_buffer,
                    ));
                }
                Ok(Err(source)) => permit.fail(&HandshakeError::Tls { peer, source }),
                Err(_) => permit.fail(&HandshakeError::TimedOut {
                    peer,
                    timeout: self.settings.handshake_timeout,
                }),
            }
        }
    }
}

/// Write side of an accepted connection.
///
/// # Closing while a send is stuck (for beginners)
///
/// A client that stops reading fills the socket buffer, and the next `send`
/// waits in `write_all` while it holds the writer lock.  If `disconnect`
/// simply waited for that lock, teardown would hang for as long as the peer
/// does, and the listener would never return to `Listening`.
///
/// So `disconnect` first raises the `closed` flag and wakes every in-flight
/// `send` through the `closing` signal.  Each `send` races its write against
/// that signal and gives up with [`SendError::PeerClosed`], which releases
/// the lock.  Only then is the writer taken and shut down, bounded by
/// [`CLOSE_TIMEOUT`].
pub struct TlsTransport<W> {
    writer: Mutex<Option<W>>,
    closed: AtomicBool,
    closing: Notify,
    shutdown: Arc<Notify>,
}

impl<W> TlsTransport<W> {
    /// Wraps `writer`.  `shutdown` is signalled once on disconnect so the
    /// matching read task stops.
    pub fn new(writer: W, shutdown: Arc<Notify>) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
            closing: Notify::new(),
            shutdown,
        }
    }

    /// Returns `true` once `disconnect` has started.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<W> TlsTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_locked(&self, bytes: &[u8]) -> Result<usize, SendError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(SendError::PeerClosed);
        };
        writer.write_all(bytes).await.map_err(send_error)?;
        writer.flush().await.map_err(send_error)?;
        Ok(bytes.len())
    }
}

#[async_trait]
impl<W> SessionTransport for TlsTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, bytes: &[u8]) -> Result<usize, SendError> {
        // Register for the closing signal before checking the flag, so a
        // disconnect between the two cannot be missed.
        let closing = self.closing.notified();
        tokio::pin!(closing);
        closing.as_mut().enable();
        if self.is_closed() {
            return Err(SendError::PeerClosed);
        }

        tokio::select! {
            biased;
            _ = &mut closing => Err(SendError::PeerClosed),
            result = self.write_locked(bytes) => result,
        }
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closing.notify_waiters();
        self.shutdown.notify_one();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match timeout(CLOSE_TIMEOUT, writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "TLS shutdown did not complete cleanly"),
                Err(_) => debug!(timeout = ?CLOSE_TIMEOUT, "TLS shutdown timed out; dropping the stream"),
            }
        }
    }
}

fn is_peer_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

fn send_error(e: io::Error) -> SendError {
    if is_peer_closed(&e) {
        SendError::PeerClosed
    } else {
        SendError::Other(e.to_string())
    }
}

/// Reads acknowledgments for `session_id` until the peer closes or the
/// session is torn down.
pub async fn read_loop<R>(
    sessions: Arc<ConnectionListener>,
    session_id: Uuid,
    mut reader: R,
    shutdown: Arc<Notify>,
    max_recv_buffer: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; max_recv_buffer.max(1)];
    let mut consecutive_errors = 0u32;

    loop {
        let read = tokio::select! {
            _ = shutdown.notified() => {
                debug!(%session_id, "read task stopped by teardown");
                return;
            }
            read = reader.read(&mut buf) => read,
        };

        let event = match read {
            Ok(0) => {
                sessions.on_disconnect(session_id).await;
                return;
            }
            Ok(n) => {
                consecutive_errors = 0;
                Ok(buf[..n].to_vec())
            }
            Err(e) if is_peer_closed(&e) => Err(RecvError::PeerClosed),
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_RECV_ERRORS {
                    Err(RecvError::PeerClosed)
                } else {
                    Err(RecvError::Other(e.to_string()))
                }
            }
        };

        match sessions.on_receive(session_id, event).await {
            ReceiveOutcome::TornDown | ReceiveOutcome::StaleSession => return,
            ReceiveOutcome::Confirmed(_) | ReceiveOutcome::Ignored => {}
        }
    }
}
