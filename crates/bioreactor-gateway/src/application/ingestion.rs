//! Telemetry ingestion: device status report → record store row.
//!
//! ```text
//! (timestamp, field mapping)
//!     │  TelemetrySnapshot::from_fields   (MissingField / InvalidField)
//!     ▼
//! TelemetrySnapshot
//!     │  RecordRow::new(receipt time, ..)
//!     ▼
//! RecordSink::append  ──► 1-based record number
//! ```
//!
//! Validation completes before anything is written, so a rejected report
//! never leaves a partial row behind.

use std::sync::Arc;

use bioreactor_core::{RecordRow, SnapshotError, StoredRow, TelemetrySnapshot};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::sink::{RecordSink, StoreError};

/// `strftime` pattern of the receipt time column.
pub const RECEIPT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors that can occur while ingesting a report.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The report failed schema validation.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The validated row could not be appended.
    #[error("failed to store telemetry: {0}")]
    Storage(#[from] StoreError),
}

/// Validates device reports and appends them to a [`RecordSink`].
#[derive(Clone)]
pub struct TelemetryIngestor {
    sink: Arc<dyn RecordSink>,
}

impl TelemetryIngestor {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }

    /// Validates `fields`, stamps the gateway receipt time, and appends the
    /// row.  Returns the appended row's 1-based record number.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Snapshot`] if a field is missing or mistyped; nothing
    ///   is written.
    /// - [`IngestError::Storage`] if the append fails.
    pub async fn ingest(
        &self,
        device_time: &str,
        fields: &Map<String, Value>,
    ) -> Result<u64, IngestError> {
        let snapshot = TelemetrySnapshot::from_fields(device_time, fields).map_err(|e| {
            warn!("telemetry rejected: {e}");
            e
        })?;
        let row = RecordRow::new(receipt_timestamp(), &snapshot);
        let record = self.sink.append(row).await?;
        info!("telemetry record {record} appended (device time {device_time})");
        Ok(record)
    }

    /// Returns every stored row in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn read_back(&self) -> Result<Vec<StoredRow>, StoreError> {
        self.sink.read_all().await
    }
}

/// Current gateway-local time in [`RECEIPT_TIME_FORMAT`].
pub fn receipt_timestamp() -> String {
    chrono::Local::now().format(RECEIPT_TIME_FORMAT).to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
