//! The storage port of the ingestion service.
//!
//! [`RecordSink`] is implemented by `infrastructure::record_store` for the
//! CSV file and by `mockall` in unit tests.

use std::path::PathBuf;

use async_trait::async_trait;
use bioreactor_core::{RecordRow, RowWidthError, StoredRow, SCHEMA_VERSION};
use thiserror::Error;

/// Record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file system I/O error occurred.
    #[error("I/O error on record store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but its header is not the current schema's.
    #[error(
        "record store {path} has a header that does not match schema version {SCHEMA_VERSION} \
         (found {found} columns); move the file aside to start a new one"
    )]
    HeaderMismatch { path: PathBuf, found: usize },

    /// A stored row has the wrong number of cells.
    #[error("record store {path}, data row {row}: {source}")]
    RowWidth {
        path: PathBuf,
        row: u64,
        #[source]
        source: RowWidthError,
    },

    /// The file could not be parsed or a row could not be encoded.
    #[error("malformed record store {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Append-only storage for telemetry rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Creates the store with its header row if it does not exist or is
    /// empty; otherwise verifies the existing header.  Idempotent.
    async fn ensure_header(&self) -> Result<(), StoreError>;

    /// Appends one row and returns its 1-based sequence number.
    async fn append(&self, row: RecordRow) -> Result<u64, StoreError>;

    /// Returns every data row in append order.
    async fn read_all(&self) -> Result<Vec<StoredRow>, StoreError>;
}
