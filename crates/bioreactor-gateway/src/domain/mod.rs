//! Domain layer for bioreactor-gateway.
//!
//! Plain data types with no dependencies on sockets, files, or runtimes:
//! the resolved runtime configuration and the JSON shapes exchanged with
//! peers and HTTP clients.

pub mod config;
pub mod messages;

pub use config::GatewayConfig;
pub use messages::{
    ErrorBody, HealthResponse, IngestRequest, IngestResponse, MessageResponse, RelayNotice,
};
