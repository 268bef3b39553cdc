//! Record-store rows.
//!
//! Every row of the record store is `(receipt time, device time, <snapshot
//! fields>)`.  The first row of a store file is [`RECORD_HEADER`]; all later
//! rows have exactly `RECORD_HEADER.len()` cells in the same order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use super::snapshot::TelemetrySnapshot;

/// The header row of every store file.
///
/// Columns 2.. mirror [`SNAPSHOT_FIELDS`](super::schema::SNAPSHOT_FIELDS).
pub const RECORD_HEADER: [&str; 28] = [
    "Backend_Time",
    "ESP_Time",
    "event",
    "programType",
    "rateOrSpeed",
    "duration",
    "tempSetpoint",
    "phSetpoint",
    "doSetpoint",
    "nutrientConc",
    "baseConc",
    "experimentName",
    "comment",
    "currentProgram",
    "programStatus",
    "airPumpStatus",
    "drainPumpStatus",
    "nutrientPumpStatus",
    "basePumpStatus",
    "stirringMotorStatus",
    "heatingPlateStatus",
    "ledGrowLightStatus",
    "waterTemp",
    "airTemp",
    "ph",
    "turbidity",
    "oxygen",
    "airFlow",
];

/// A row ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    cells: Vec<String>,
}

impl RecordRow {
    /// Builds the fixed-order row for `snapshot`, stamped with `receipt_time`.
    pub fn new(receipt_time: impl Into<String>, snapshot: &TelemetrySnapshot) -> Self {
        let mut cells = Vec::with_capacity(RECORD_HEADER.len());
        cells.push(receipt_time.into());
        cells.push(snapshot.device_time().to_string());
        cells.extend(snapshot.cells());
        Self { cells }
    }

    /// The row's cells in column order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// A stored row had the wrong number of cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row has {found} cells, expected {expected}")]
pub struct RowWidthError {
    pub expected: usize,
    pub found: usize,
}

/// A row read back from the store.
///
/// Serializes as a JSON object keyed by [`RECORD_HEADER`], in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    values: Vec<String>,
}

impl StoredRow {
    /// The receipt (gateway clock) timestamp.
    pub fn receipt_time(&self) -> &str {
        &self.values[0]
    }

    /// The device-reported timestamp.
    pub fn device_time(&self) -> &str {
        &self.values[1]
    }

    /// Looks up a cell by column name.
    pub fn get(&self, column: &str) -> Option<&str> {
        RECORD_HEADER
            .iter()
            .position(|c| *c == column)
            .map(|i| self.values[i].as_str())
    }

    /// All cells in column order.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl TryFrom<Vec<String>> for StoredRow {
    type Error = RowWidthError;

    fn try_from(values: Vec<String>) -> Result<Self, Self::Error> {
        if values.len() != RECORD_HEADER.len() {
            return Err(RowWidthError {
                expected: RECORD_HEADER.len(),
                found: values.len(),
            });
        }
        Ok(Self { values })
    }
}

impl From<RecordRow> for StoredRow {
    fn from(row: RecordRow) -> Self {
        Self { values: row.cells }
    }
}

impl Serialize for StoredRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in RECORD_HEADER.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
