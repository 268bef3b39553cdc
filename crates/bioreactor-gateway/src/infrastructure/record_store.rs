//! CSV-backed record store.
//!
//! One append-only file.  The first line is [`RECORD_HEADER`]; every later
//! line is one telemetry row with exactly as many cells.  Rows are encoded
//! with the `csv` crate (comma separated, `"` quoting only when a cell needs
//! it, `\n` line endings) and written with a single `write_all` each.
//!
//! # Concurrency
//!
//! All access goes through one `tokio::sync::Mutex` that also holds the row
//! counter, so appends are serialized and record numbers are dense.  The
//! store assumes it is the file's only writer; there is no cross-process
//! locking.
//!
//! # Header verification
//!
//! The header is written only when the file is missing or empty and is
//! never rewritten.  A non-empty file whose first line differs from the
//! current header is rejected with [`StoreError::HeaderMismatch`] rather than
//! extended with rows the header does not describe.
//!
//! # Recovery
//!
//! Bootstrap drops an unterminated last line (a row torn by a crash or a
//! full disk) so the next append starts on a fresh line.  Before every
//! append the store checks that the file still exists and is non-empty; a
//! file removed or truncated behind its back is bootstrapped again, header
//! first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bioreactor_core::{RecordRow, StoredRow, RECORD_HEADER};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::sink::{RecordSink, StoreError};

/// Append-only CSV file implementing [`RecordSink`].
#[derive(Debug)]
pub struct CsvRecordStore {
    path: PathBuf,
    // `None` until the header has been written or verified; then the number
    // of data rows in the file.
    rows: Mutex<Option<u64>>,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates or verifies the file and returns its current data row count.
    async fn bootstrap(&self) -> Result<u64, StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let mut existing = self.read_bytes().await?;
        let complete = existing
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        if complete < existing.len() {
            warn!(
                "record store {}: discarding {} bytes of an unterminated last line",
                self.path.display(),
                existing.len() - complete
            );
            self.truncate(complete as u64).await?;
            existing.truncate(complete);
        }

        if existing.is_empty() {
            let header = encode_record(&self.path, RECORD_HEADER)?;
            self.write_bytes(&header).await?;
            info!("record store {} created", self.path.display());
            return Ok(0);
        }

        let records = parse_records(&self.path, &existing)?;
        let header = records.first().map(Vec::as_slice).unwrap_or_default();
        if !header.iter().map(String::as_str).eq(RECORD_HEADER) {
            return Err(StoreError::HeaderMismatch {
                path: self.path.clone(),
                found: header.len(),
            });
        }

        let rows = records.len().saturating_sub(1) as u64;
        info!(
            "record store {} opened with {rows} existing rows",
            self.path.display()
        );
        Ok(rows)
    }

    /// Reads the whole file; a missing file reads as empty.
    async fn read_bytes(&self) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Returns `true` if the file exists and holds at least one byte.
    async fn has_content(&self) -> Result<bool, StoreError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn truncate(&self, len: u64) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.set_len(len).await.map_err(io_err)
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }
}

#[async_trait]
impl RecordSink for CsvRecordStore {
    async fn ensure_header(&self) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        *rows = Some(self.bootstrap().await?);
        Ok(())
    }

    async fn append(&self, row: RecordRow) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        let current = match *rows {
            Some(n) if self.has_content().await? => n,
            Some(_) => {
                warn!(
                    "record store {} was removed or emptied; recreating it",
                    self.path.display()
                );
                self.bootstrap().await?
            }
            None => self.bootstrap().await?,
        };

        let line = encode_record(&self.path, row.cells())?;
        if let Err(e) = self.write_bytes(&line).await {
            error!("append to {} failed: {e}", self.path.display());
            // The next append bootstraps again, which trims a partially
            // written line and recounts the rows that did reach the disk.
            *rows = None;
            return Err(e);
        }

        let record = current + 1;
        *rows = Some(record);
        debug!("record store {}: row {record} written", self.path.display());
        Ok(record)
    }

    async fn read_all(&self) -> Result<Vec<StoredRow>, StoreError> {
        let _guard = self.rows.lock().await;
        let bytes = self.read_bytes().await?;
        parse_records(&self.path, &bytes)?
            .into_iter()
            .skip(1)
            .enumerate()
            .map(|(i, cells)| {
                StoredRow::try_from(cells).map_err(|source| StoreError::RowWidth {
                    path: self.path.clone(),
                    row: i as u64 + 1,
                    source,
                })
            })
            .collect()
    }
}

// ── CSV helpers ───────────────────────────────────────────────────────────────

fn encode_record<I, T>(path: &Path, cells: I) -> Result<Vec<u8>, StoreError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(cells)
        .map_err(|e| csv_failure(path, e))?;
    writer.into_inner().map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.into_error(),
    })
}

/// Parses every line, header included, into cell vectors.
fn parse_records(path: &Path, bytes: &[u8]) -> Result<Vec<Vec<String>>, StoreError> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes)
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| csv_failure(path, e))
        })
        .collect()
}

fn csv_failure(path: &Path, err: csv::Error) -> StoreError {
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => StoreError::Io {
            path: path.to_path_buf(),
            source,
        },
        _ => StoreError::Malformed {
            path: path.to_path_buf(),
            reason,
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
