//! TOML-based configuration for the LED command server.
//!
//! The file path comes from `--config` (or `LEDCMD_CONFIG`) and defaults to
//! `ledcmd.toml` in the working directory.  A missing file is not an error:
//! every setting has a default, so the server runs on first start.
//!
//! # What is TOML? (for beginners)
//!
//! TOML is a small configuration format with `[sections]` and `key = value`
//! pairs.  Example:
//!
//! ```toml
//! [server]
//! port = 50007
//! bind_address = "0.0.0.0"
//!
//! [protocol]
//! ack_policy = "two_way"
//! ```
//!
//! `serde` generates the parsing code from the `#[derive(Deserialize)]`
//! structs below.  Fields annotated with `#[serde(default = "some_fn")]` take
//! the value of `some_fn()` when missing, so a partial file works too.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ledcmd_core::{protocol::MAX_RECV_BUFFER_SIZE, AckPolicy, DEBOUNCE_TIME_MS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(default)]
    pub button: ButtonSection,
    #[serde(default)]
    pub protocol: ProtocolSection,
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub log: LogSection,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Local address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port clients connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen backlog.
    #[serde(default = "default_max_pending_connections")]
    pub max_pending_connections: u32,
    /// Bound on the TLS handshake of one connect request, in milliseconds.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
}

/// PEM files for mutual TLS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    #[serde(default = "default_server_cert")]
    pub server_cert: PathBuf,
    #[serde(default = "default_server_key")]
    pub server_key: PathBuf,
    /// Root CA that client certificates must chain to.
    #[serde(default = "default_client_ca")]
    pub client_ca: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ButtonSection {
    /// Minimum spacing between accepted edges, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolSection {
    /// Maximum bytes considered per acknowledgment.
    #[serde(default = "default_max_recv_buffer")]
    pub max_recv_buffer: usize,
    /// `"two_way"`: anything but `LED ON ACK` means OFF.
    /// `"three_way"`: unrecognized acknowledgments leave the state unchanged.
    #[serde(default)]
    pub ack_policy: AckPolicy,
}

/// Link bring-up retry budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    #[serde(default = "default_link_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_link_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSection {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    50007
}
fn default_max_pending_connections() -> u32 {
    3
}
fn default_recv_timeout_ms() -> u64 {
    500
}
fn default_server_cert() -> PathBuf {
    PathBuf::from("certs/server.crt")
}
fn default_server_key() -> PathBuf {
    PathBuf::from("certs/server.key")
}
fn default_client_ca() -> PathBuf {
    PathBuf::from("certs/client_ca.crt")
}
fn default_debounce_ms() -> u64 {
    DEBOUNCE_TIME_MS
}
fn default_max_recv_buffer() -> usize {
    MAX_RECV_BUFFER_SIZE
}
fn default_link_max_attempts() -> u32 {
    3
}
fn default_link_retry_delay_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_pending_connections: default_max_pending_connections(),
            recv_timeout_ms: default_recv_timeout_ms(),
        }
    }
}

impl Default for TlsSection {
    fn default() -> Self {
        Self {
            server_cert: default_server_cert(),
            server_key: default_server_key(),
            client_ca: default_client_ca(),
        }
    }
}

impl Default for ButtonSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            max_recv_buffer: default_max_recv_buffer(),
            ack_policy: AckPolicy::default(),
        }
    }
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            max_attempts: default_link_max_attempts(),
            retry_delay_ms: default_link_retry_delay_ms(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl AppConfig {
    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_ip()?;
        if self.server.max_pending_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "server.max_pending_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.recv_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "server.recv_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.protocol.max_recv_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "protocol.max_recv_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.link.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "link.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The configured bind address, parsed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `server.bind_address` is not an IP address.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.server
            .bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                field: "server.bind_address",
                reason: e.to_string(),
            })
    }

    /// Socket address to listen on, given the address the link came up with.
    pub fn listen_addr(&self, link_ip: IpAddr) -> SocketAddr {
        SocketAddr::new(link_ip, self.server.port)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.server.recv_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.button.debounce_ms)
    }

    pub fn link_retry_delay(&self) -> Duration {
        Duration::from_millis(self.link.retry_delay_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path` as pretty TOML, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ledcmd-config-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_has_expected_server_settings() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.server.port, 50007);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.server.max_pending_connections, 3);
        assert_eq!(cfg.handshake_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_default_config_matches_protocol_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.button.debounce_ms, DEBOUNCE_TIME_MS);
        assert_eq!(cfg.protocol.max_recv_buffer, MAX_RECV_BUFFER_SIZE);
        assert_eq!(cfg.protocol.ack_policy, AckPolicy::TwoWay);
    }

    #[test]
    fn test_default_link_budget() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.link.max_attempts, 3);
        assert_eq!(cfg.link_retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_file_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty TOML must parse");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        // Arrange
        let text = r#"
            [server]
            port = 6000

            [protocol]
            ack_policy = "three_way"
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(text).expect("partial TOML must parse");

        // Assert
        assert_eq!(cfg.server.port, 6000);
        assert_eq!(cfg.server.recv_timeout_ms, 500);
        assert_eq!(cfg.protocol.ack_policy, AckPolicy::ThreeWay);
        assert_eq!(cfg.tls, TlsSection::default());
    }

    #[test]
    fn test_unknown_ack_policy_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[protocol]\nack_policy = \"sometimes\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serializes_and_deserializes_round_trip() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 9000;
        cfg.protocol.ack_policy = AckPolicy::ThreeWay;

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&text).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_bad_bind_address_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.server.bind_address = "not-an-ip".to_string();

        let err = cfg.validate().unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { field: "server.bind_address", .. }));
    }

    #[test]
    fn test_zero_backlog_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.server.max_pending_connections = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "server.max_pending_connections", .. })
        ));
    }

    #[test]
    fn test_listen_addr_uses_link_ip_and_port() {
        let cfg = AppConfig::default();
        let addr = cfg.listen_addr("192.168.4.1".parse().unwrap());
        assert_eq!(addr, "192.168.4.1:50007".parse().unwrap());
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = load_config(&temp_path("absent.toml")).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_returns_same_config() {
        // Arrange
        let path = temp_path("ledcmd.toml");
        let mut cfg = AppConfig::default();
        cfg.log.level = "debug".to_string();

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let path = temp_path("broken.toml");
        save_config(&path, &AppConfig::default()).expect("save");
        std::fs::write(&path, "[server\nport = ").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }
}
