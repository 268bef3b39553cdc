//! bioreactor-gateway library crate.
//!
//! The gateway sits between one embedded bioreactor controller (the *device*)
//! and the operator UI (the *frontend*).  It relays WebSocket traffic between
//! the two, turns operator HTTP requests into device commands, and appends
//! every device status report to a CSV record store.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Device (WebSocket)        Frontend (WebSocket + HTTP)
//!         ↕                          ↕
//! [bioreactor-gateway]
//!   ├── domain/           Pure types: GatewayConfig, HTTP/relay message shapes
//!   ├── application/      Registry, relay engine, command dispatcher, ingestion
//!   └── infrastructure/
//!         ├── ws_server/    WebSocket accept loop (tokio-tungstenite)
//!         ├── http_api/     axum router and error mapping
//!         ├── record_store/ CSV-backed RecordSink
//!         └── settings/     TOML configuration file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `bioreactor-core`; storage is
//!   reached only through the [`application::RecordSink`] trait.
//! - `infrastructure` depends on all other layers plus `tokio`, `axum`,
//!   `tungstenite`, and `csv`.

/// Domain layer: configuration and message shapes (no I/O).
pub mod domain;

/// Application layer: connection registry, relay, dispatch, ingestion.
pub mod application;

/// Infrastructure layer: WebSocket server, HTTP API, record store, settings.
pub mod infrastructure;
