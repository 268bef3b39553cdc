//! Bioreactor gateway: entry point.
//!
//! Runs two listeners side by side:
//!
//! - a WebSocket relay that pairs the embedded controller (the device) with
//!   the operator UI (the frontend) and forwards text frames between them;
//! - an HTTP API that turns operator requests into device commands and
//!   appends device status reports to the CSV record store.
//!
//! # Usage
//!
//! ```text
//! bioreactor-gateway [OPTIONS]
//!
//! Options:
//!   --config    <PATH>  TOML configuration file [default: bioreactor.toml]
//!   --ws-bind   <IP>    WebSocket relay bind address [default: 0.0.0.0]
//!   --ws-port   <PORT>  WebSocket relay port [default: 8765]
//!   --http-bind <IP>    HTTP API bind address [default: 0.0.0.0]
//!   --http-port <PORT>  HTTP API port [default: 8000]
//!   --data-file <PATH>  CSV record store [default: data/data.csv]
//!   --log-level <LEVEL> Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Configuration precedence
//!
//! CLI flag, then environment variable, then the TOML file, then the
//! built-in default.
//!
//! | Variable                 | Flag          | TOML key             |
//! |--------------------------|---------------|----------------------|
//! | `BIOREACTOR_CONFIG`      | `--config`    |                      |
//! | `BIOREACTOR_WS_BIND`     | `--ws-bind`   | `server.ws_bind`     |
//! | `BIOREACTOR_WS_PORT`     | `--ws-port`   | `server.ws_port`     |
//! | `BIOREACTOR_HTTP_BIND`   | `--http-bind` | `server.http_bind`   |
//! | `BIOREACTOR_HTTP_PORT`   | `--http-port` | `server.http_port`   |
//! | `BIOREACTOR_DATA_FILE`   | `--data-file` | `storage.data_file`  |
//! | `BIOREACTOR_LOG_LEVEL`   | `--log-level` | `logging.level`      |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use bioreactor_core::SCHEMA_VERSION;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bioreactor_gateway::application::{
    CommandDispatcher, ConnectionRegistry, RecordSink, RelayEngine, TelemetryIngestor,
};
use bioreactor_gateway::domain::GatewayConfig;
use bioreactor_gateway::infrastructure::settings::load_settings;
use bioreactor_gateway::infrastructure::{
    run_http_server, run_ws_server, AppState, CsvRecordStore,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bioreactor gateway.
///
/// Options left unset fall back to the configuration file, then to built-in
/// defaults.
#[derive(Debug, Parser)]
#[command(
    name = "bioreactor-gateway",
    about = "WebSocket relay and HTTP command/telemetry gateway for a bioreactor controller",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file is not an error.
    #[arg(long, default_value = "bioreactor.toml", env = "BIOREACTOR_CONFIG")]
    config: PathBuf,

    /// IP address for the WebSocket relay to bind to.
    #[arg(long, env = "BIOREACTOR_WS_BIND")]
    ws_bind: Option<String>,

    /// TCP port for the WebSocket relay.
    #[arg(long, env = "BIOREACTOR_WS_PORT")]
    ws_port: Option<u16>,

    /// IP address for the HTTP API to bind to.
    #[arg(long, env = "BIOREACTOR_HTTP_BIND")]
    http_bind: Option<String>,

    /// TCP port for the HTTP API.
    #[arg(long, env = "BIOREACTOR_HTTP_PORT")]
    http_port: Option<u16>,

    /// Path of the CSV record store.
    #[arg(long, env = "BIOREACTOR_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[arg(long, env = "BIOREACTOR_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Resolves the final [`GatewayConfig`] from the flags and the
    /// configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if a bind address is not a valid IP address.
    fn into_gateway_config(self) -> anyhow::Result<GatewayConfig> {
        let file = load_settings(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;

        let ws_bind = self.ws_bind.unwrap_or(file.server.ws_bind);
        let ws_port = self.ws_port.unwrap_or(file.server.ws_port);
        let http_bind = self.http_bind.unwrap_or(file.server.http_bind);
        let http_port = self.http_port.unwrap_or(file.server.http_port);

        Ok(GatewayConfig {
            ws_bind_addr: socket_addr(&ws_bind, ws_port)
                .context("invalid WebSocket bind address")?,
            http_bind_addr: socket_addr(&http_bind, http_port)
                .context("invalid HTTP bind address")?,
            data_file: self.data_file.unwrap_or(file.storage.data_file),
            log_level: self.log_level.unwrap_or(file.logging.level),
        })
    }
}

fn socket_addr(ip: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{ip}:{port}")
        .parse()
        .with_context(|| format!("'{ip}:{port}' is not a valid socket address"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Parse the CLI and resolve the configuration.
/// 2. Initialise `tracing_subscriber` (`RUST_LOG` wins over `--log-level`).
/// 3. Open the record store, writing or verifying its header.  A header
///    mismatch stops the gateway here.
/// 4. Spawn a Ctrl+C handler that clears the shared `running` flag.
/// 5. Run the WebSocket relay and the HTTP API until shutdown.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_gateway_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "bioreactor gateway starting: ws={}, http={}, store={} (schema v{SCHEMA_VERSION})",
        config.ws_bind_addr,
        config.http_bind_addr,
        config.data_file.display()
    );

    // ── Record store bootstrap ────────────────────────────────────────────────
    let store = Arc::new(CsvRecordStore::new(&config.data_file));
    store
        .ensure_header()
        .await
        .with_context(|| format!("failed to open record store {}", config.data_file.display()))?;

    // ── Application services ──────────────────────────────────────────────────
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Arc::new(RelayEngine::new(Arc::clone(&registry)));
    let state = AppState {
        dispatcher: Arc::new(CommandDispatcher::new(Arc::clone(&relay))),
        ingestor: Arc::new(TelemetryIngestor::new(store)),
        registry,
    };

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Listeners ─────────────────────────────────────────────────────────────
    tokio::try_join!(
        run_ws_server(config.ws_bind_addr, relay, Arc::clone(&running)),
        run_http_server(config.http_bind_addr, state, running),
    )?;

    info!("bioreactor gateway stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
