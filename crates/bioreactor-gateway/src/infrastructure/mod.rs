//! Infrastructure layer for bioreactor-gateway.
//!
//! Everything that touches sockets or files:
//!
//! - Accepting relay WebSocket connections and running their sessions
//! - Serving the HTTP API
//! - Reading and appending the CSV record store
//! - Loading the TOML configuration file
//!
//! Relay, dispatch, and validation rules live in the application layer.

pub mod http_api;
pub mod record_store;
pub mod settings;
pub mod ws_server;

pub use http_api::{run_http_server, AppState};
pub use record_store::CsvRecordStore;
pub use ws_server::run_ws_server;
