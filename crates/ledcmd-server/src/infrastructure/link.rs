//! Secure link bring-up.
//!
//! Before the server can listen, the network link it binds to must be up.
//! On the host this means "the configured bind address is assigned to a
//! local interface".  Bring-up is retried a bounded number of times; after
//! the budget is exhausted the failure is fatal.
//!
//! Bring-up uses blocking std sockets and `std::thread::sleep`; async callers
//! run it on `tokio::task::spawn_blocking`.

use std::net::{IpAddr, UdpSocket};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

/// Error type for link bring-up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// A single bring-up attempt failed.
    #[error("link unavailable: {0}")]
    Unavailable(String),
    /// Every attempt failed.
    #[error("link bring-up failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Source of the network link the server binds to.
pub trait LinkProvider: Send + Sync {
    /// Brings the link up and returns the local address to bind.
    fn establish_link(&self) -> Result<IpAddr, LinkError>;
}

/// Link provider for a host OS: the configured address must be local.
#[derive(Debug, Clone, Copy)]
pub struct HostLink {
    bind_address: IpAddr,
}

impl HostLink {
    pub fn new(bind_address: IpAddr) -> Self {
        Self { bind_address }
    }
}

impl LinkProvider for HostLink {
    fn establish_link(&self) -> Result<IpAddr, LinkError> {
        if self.bind_address.is_unspecified() {
            return Ok(self.bind_address);
        }

        // Binding an ephemeral UDP port only succeeds for addresses owned by
        // a local interface.
        UdpSocket::bind((self.bind_address, 0))
            .map(|_| self.bind_address)
            .map_err(|e| LinkError::Unavailable(format!("{} is not a local address: {e}", self.bind_address)))
    }
}

/// Calls `provider.establish_link()` up to `max_attempts` times, sleeping
/// `retry_delay` between failures.
///
/// A `max_attempts` of zero is treated as one attempt.
///
/// # Errors
///
/// Returns [`LinkError::RetriesExhausted`] carrying the last failure.
pub fn establish_with_retry<P>(
    provider: &P,
    max_attempts: u32,
    retry_delay: Duration,
) -> Result<IpAddr, LinkError>
where
    P: LinkProvider + ?Sized,
{
    let max_attempts = max_attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=max_attempts {
        match provider.establish_link() {
            Ok(addr) => {
                info!(%addr, attempt, "link established");
                return Ok(addr);
            }
            Err(e) => {
                last = e.to_string();
                if attempt < max_attempts {
                    warn!(attempt, max_attempts, error = %e, "link bring-up failed, retrying...");
                    std::thread::sleep(retry_delay);
                }
            }
        }
    }

    error!(attempts = max_attempts, error = %last, "link bring-up failed");
    Err(LinkError::RetriesExhausted {
        attempts: max_attempts,
        last,
    })
}
