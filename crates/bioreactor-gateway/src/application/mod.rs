//! Application layer for bioreactor-gateway.
//!
//! Knows *what* the gateway does with connections, commands, and telemetry,
//! and delegates *how* bytes move to the infrastructure layer.
//!
//! - [`registry`]: the two role slots.
//! - [`relay`]: device ↔ frontend forwarding and acknowledgements.
//! - [`dispatcher`]: operator commands → device.
//! - [`ingestion`]: device reports → record store.
//! - [`sink`]: the storage trait the ingestion service writes through.

pub mod dispatcher;
pub mod ingestion;
pub mod registry;
pub mod relay;
pub mod sink;

pub use dispatcher::{CommandDispatcher, DispatchError, DispatchOutcome};
pub use ingestion::{IngestError, TelemetryIngestor};
pub use registry::{ConnectionRegistry, DeliverError, PeerGone, PeerHandle, PeerInbox, RegistryStatus};
pub use relay::{Delivery, RelayEngine};
pub use sink::{RecordSink, StoreError};
