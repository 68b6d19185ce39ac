//! LED command server entry point.
//!
//! Wires the infrastructure adapters to the application use cases and runs
//! until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config, init logging
//!  └─ establish_with_retry(HostLink)     -- fatal after the retry budget
//!  └─ SecureContext::from_pem_files      -- mutual TLS
//!  └─ TlsServer::bind                    -- listen(backlog)
//!  └─ StdinButton ─► ButtonInputDebouncer ─► NotificationChannel
//!  └─ select!
//!       ├─ CommandDispatcher::run        (waits for triggers)
//!       ├─ TlsServer::serve              (accept loop, read tasks)
//!       └─ Ctrl-C
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ledcmd_server::application::debouncer::ButtonInputDebouncer;
use ledcmd_server::application::dispatch::CommandDispatcher;
use ledcmd_server::application::listener::ConnectionListener;
use ledcmd_server::application::notification::NotificationChannel;
use ledcmd_server::application::session::SessionSettings;
use ledcmd_server::infrastructure::button_input::{stdin::StdinButton, ButtonSource};
use ledcmd_server::infrastructure::link::{establish_with_retry, HostLink};
use ledcmd_server::infrastructure::network::server::{ServerSettings, TlsServer};
use ledcmd_server::infrastructure::network::tls::SecureContext;
use ledcmd_server::infrastructure::storage::config::{load_config, save_config, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Single-client TLS server that toggles a remote LED on each button press.
#[derive(Debug, Parser)]
#[command(
    name = "ledcmd-server",
    about = "Sends button-triggered LED ON/OFF commands to one TLS client",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.  A missing file means defaults.
    #[arg(long, default_value = "ledcmd.toml", env = "LEDCMD_CONFIG")]
    config: PathBuf,

    /// Overrides `server.port` from the configuration file.
    #[arg(long)]
    port: Option<u16>,

    /// Writes a configuration file with every default to `--config` and exits.
    #[arg(long)]
    write_default_config: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.write_default_config {
        init_tracing("info");
        save_config(&cli.config, &AppConfig::default())
            .with_context(|| format!("failed to write {}", cli.config.display()))?;
        info!(path = %cli.config.display(), "default configuration written");
        return Ok(());
    }

    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    init_tracing(&config.log.level);
    config.validate().context("invalid configuration")?;

    info!(config = %cli.config.display(), "LED command server starting");

    // ── Secure link ───────────────────────────────────────────────────────────
    let link = HostLink::new(config.bind_ip()?);
    let max_attempts = config.link.max_attempts;
    let retry_delay = config.link_retry_delay();
    let link_ip = tokio::task::spawn_blocking(move || establish_with_retry(&link, max_attempts, retry_delay))
        .await
        .context("link bring-up task failed")?
        .context("secure link could not be established")?;

    // ── TLS listener ──────────────────────────────────────────────────────────
    let secure = SecureContext::from_pem_files(
        &config.tls.server_cert,
        &config.tls.server_key,
        &config.tls.client_ca,
    )
    .context("failed to load TLS credentials")?;

    let session_settings = SessionSettings {
        ack_policy: config.protocol.ack_policy,
        max_recv_buffer: config.protocol.max_recv_buffer,
    };
    let sessions = Arc::new(ConnectionListener::new(config.server.port, session_settings));
    let server = TlsServer::bind(
        ServerSettings {
            listen_addr: config.listen_addr(link_ip),
            backlog: config.server.max_pending_connections,
            handshake_timeout: config.handshake_timeout(),
            max_recv_buffer: config.protocol.max_recv_buffer,
        },
        secure,
        Arc::clone(&sessions),
    )
    .context("failed to start TLS server")?;
    sessions.announce_listening();

    // ── Button → dispatcher ───────────────────────────────────────────────────
    let channel = Arc::new(NotificationChannel::new());
    let debouncer = Arc::new(ButtonInputDebouncer::new(config.debounce(), Arc::clone(&channel)));
    let button = StdinButton::new();
    button
        .start(debouncer)
        .context("failed to start button input")?;
    let dispatcher = CommandDispatcher::new(channel, Arc::clone(&sessions));

    // ── Run until Ctrl-C ──────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    tokio::select! {
        _ = dispatcher.run(Arc::clone(&running)) => {}
        _ = server.serve() => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl+C signal"),
        },
    }

    running.store(false, Ordering::Relaxed);
    button.stop();
    sessions.shutdown().await;

    info!("LED command server stopped");
    Ok(())
}

/// Initialises `tracing`.  `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
