//! Gateway configuration types.
//!
//! [`GatewayConfig`] is the single source of truth for all runtime settings.
//! `main.rs` resolves it from CLI flags, environment variables, and the
//! optional TOML file (see `infrastructure::settings`); tests build it
//! directly or start from [`GatewayConfig::default`].

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default location of the append-only record store, relative to the working
/// directory.
pub const DEFAULT_DATA_FILE: &str = "data/data.csv";

/// All runtime configuration for the gateway.
///
/// # Example
///
/// ```rust
/// use bioreactor_gateway::domain::GatewayConfig;
///
/// let cfg = GatewayConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8765);
/// assert_eq!(cfg.http_bind_addr.port(), 8000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Address the WebSocket relay listener binds to.
    pub ws_bind_addr: SocketAddr,

    /// Address the HTTP API binds to.
    pub http_bind_addr: SocketAddr,

    /// Path of the CSV record store.  The parent directory is created on
    /// startup if it does not exist.
    pub data_file: PathBuf,

    /// `tracing` filter used when `RUST_LOG` is not set (e.g. `"info"`,
    /// `"bioreactor_gateway=debug"`).
    pub log_level: String,
}

impl Default for GatewayConfig {
    /// | Field          | Default          |
    /// |----------------|------------------|
    /// | ws_bind_addr   | `0.0.0.0:8765`   |
    /// | http_bind_addr | `0.0.0.0:8000`   |
    /// | data_file      | `data/data.csv`  |
    /// | log_level      | `info`           |
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address strings.
            ws_bind_addr: "0.0.0.0:8765".parse().unwrap(),
            http_bind_addr: "0.0.0.0:8000".parse().unwrap(),
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            log_level: "info".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
