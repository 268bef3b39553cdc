//! Telemetry schema, snapshot validation, and record-store rows.
//!
//! ```text
//! JSON field mapping ──TelemetrySnapshot::from_fields──► TelemetrySnapshot
//!                                                             │
//!                                             RecordRow::new(receipt, &snapshot)
//!                                                             ▼
//!                                           fixed-order row (RECORD_HEADER)
//! ```

pub mod record;
pub mod schema;
pub mod snapshot;
