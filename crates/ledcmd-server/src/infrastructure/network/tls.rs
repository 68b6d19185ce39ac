//! Secure context: the server side of the mutually-authenticated TLS channel.
//!
//! # Mutual TLS (for beginners)
//!
//! In ordinary TLS only the server proves its identity.  Here the client must
//! prove its identity too: during the handshake it presents a certificate,
//! and the server accepts it only if it chains to the configured client CA.
//! A client without a valid certificate never reaches the `SessionActive`
//! state.
//!
//! Three PEM files are loaded at start-up:
//!
//! | File          | Content                                     |
//! |---------------|---------------------------------------------|
//! | `server_cert` | server certificate chain, leaf first        |
//! | `server_key`  | private key of the leaf certificate         |
//! | `client_ca`   | root CA(s) that client certificates chain to |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// Error type for building the TLS context.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    /// A PEM file could not be read or parsed.
    #[error("failed to read PEM file {path}: {source}")]
    Pem {
        path: PathBuf,
        #[source]
        source: rustls::pki_types::pem::Error,
    },
    /// A PEM file contained no certificate.
    #[error("no certificate found in {0}")]
    NoCertificates(PathBuf),
    /// The client CA verifier could not be built.
    #[error("invalid client CA: {0}")]
    ClientVerifier(#[from] VerifierBuilderError),
    /// rustls rejected the certificate, key or CA.
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Shared TLS acceptor for incoming client connections.
#[derive(Clone)]
pub struct SecureContext {
    acceptor: TlsAcceptor,
}

impl SecureContext {
    /// Wraps an already-built rustls server configuration.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            acceptor: TlsAcceptor::from(config),
        }
    }

    /// Builds a mutual-TLS context from PEM files.
    ///
    /// # Errors
    ///
    /// Returns [`TlsSetupError`] if a file cannot be read, contains no usable
    /// material, or is rejected by rustls.
    pub fn from_pem_files(
        server_cert: &Path,
        server_key: &Path,
        client_ca: &Path,
    ) -> Result<Self, TlsSetupError> {
        let chain = load_certificates(server_cert)?;
        let key = PrivateKeyDer::from_pem_file(server_key).map_err(|source| TlsSetupError::Pem {
            path: server_key.to_path_buf(),
            source,
        })?;

        let mut roots = RootCertStore::empty();
        for ca in load_certificates(client_ca)? {
            roots.add(ca)?;
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
                .build()?;

        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(chain, key)?;

        info!(
            cert = %server_cert.display(),
            client_ca = %client_ca.display(),
            "TLS context loaded; client certificates required"
        );
        Ok(Self::new(Arc::new(config)))
    }

    /// The acceptor that performs the server side of the handshake.
    pub fn acceptor(&self) -> &TlsAcceptor {
        &self.acceptor
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let pem_error = |source| TlsSetupError::Pem {
        path: path.to_path_buf(),
        source,
    };
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(pem_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_error)?;

    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ledcmd-tls-{}-{name}", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_certificate_file_is_reported_with_path() {
        // Arrange
        let missing = Path::new("/nonexistent/ledcmd/server.crt");

        // Act
        let result = SecureContext::from_pem_files(missing, missing, missing);

        // Assert
        match result {
            Err(TlsSetupError::Pem { path, .. }) => assert_eq!(path, missing),
            Err(other) => panic!("expected Pem error, got {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_file_without_certificates_is_rejected() {
        let path = temp_file("empty.crt", "not a pem file\n");

        let result = load_certificates(&path);

        assert!(matches!(result, Err(TlsSetupError::NoCertificates(p)) if p == path));
        std::fs::remove_file(path).ok();
    }
}
