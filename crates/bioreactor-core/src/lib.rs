//! # bioreactor-core
//!
//! Shared library for the bioreactor gateway containing the pure domain types:
//! connection roles, the operator command set, and the telemetry schema used
//! by the append-only record store.
//!
//! This crate has zero dependencies on sockets, files, or async runtimes.
//!
//! # Architecture overview (for beginners)
//!
//! The bioreactor is driven by an embedded controller (the *device*).  One or
//! more operator *frontends* watch its telemetry and send it commands.  Both
//! talk to a *gateway* process, which lives in the `bioreactor-gateway` crate.
//! This crate is the vocabulary they share:
//!
//! - **`domain`** – Who is talking ([`Role`], [`ConnectionId`]) and what an
//!   operator may ask the device to do ([`Command`]).  Commands are a closed
//!   sum type; building one from request parameters validates every field.
//!
//! - **`telemetry`** – What a device status report looks like.  The schema is a
//!   fixed, ordered list of typed fields ([`SNAPSHOT_FIELDS`]).  A loosely-typed
//!   JSON mapping becomes a [`TelemetrySnapshot`] in a single validation pass,
//!   and a snapshot becomes one fixed-order row of the record store.

pub mod domain;
pub mod telemetry;

// Re-export the most-used types at the crate root so callers can write
// `bioreactor_core::Command` instead of `bioreactor_core::domain::command::Command`.
pub use domain::command::{
    Command, DrainParams, FermentationParams, FermentationProfile, MixParams, ValidationError,
};
pub use domain::role::{ConnectionId, Role, ROLE_HEADER};
pub use telemetry::record::{RecordRow, RowWidthError, StoredRow, RECORD_HEADER};
pub use telemetry::schema::{FieldKind, FieldSpec, SCHEMA_VERSION, SNAPSHOT_FIELDS};
pub use telemetry::snapshot::{FieldValue, SnapshotError, TelemetrySnapshot};
