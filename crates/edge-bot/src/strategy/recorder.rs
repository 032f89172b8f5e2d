//! Append-only sink for evaluation records.
//!
//! The recorder is the narrow seam between the evaluator and durable
//! storage: it validates required fields and hands the record to the
//! persistence collaborator. No business logic lives here, so tests can
//! substitute the in-memory sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

use super::evaluate::ResultRecord;

/// Errors from the recording seam.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A required record field is empty.
    #[error("invalid record: {0}")]
    Invalid(&'static str),

    /// The persistence collaborator failed.
    #[error("record I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Output seam for evaluation records.
pub trait RecordSink: Send + Sync {
    /// Append one record. Records are immutable once appended.
    fn append(&self, record: &ResultRecord) -> Result<(), RecorderError>;
}

/// Reject records with missing required fields before they reach storage.
fn validate(record: &ResultRecord) -> Result<(), RecorderError> {
    if record.market_title.trim().is_empty() {
        return Err(RecorderError::Invalid("market_title is empty"));
    }
    if record.suggest1.trim().is_empty() {
        return Err(RecorderError::Invalid("suggest1 is empty"));
    }
    if record.investment <= rust_decimal::Decimal::ZERO {
        return Err(RecorderError::Invalid("investment is non-positive"));
    }
    Ok(())
}

/// CSV file sink for the decision log.
///
/// Header is written once on file creation; rows are appended thereafter.
pub struct CsvRecorder {
    file: Mutex<File>,
}

impl CsvRecorder {
    /// Open (or create) the decision log at `path`.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file_exists = path.exists();

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let recorder = Self {
            file: Mutex::new(file),
        };

        if !file_exists {
            recorder.write_header()?;
        }

        Ok(recorder)
    }

    fn write_header(&self) -> std::io::Result<()> {
        let mut file = self.file.lock().expect("recorder mutex poisoned");
        file.write_all(ResultRecord::csv_header().as_bytes())
    }
}

impl RecordSink for CsvRecorder {
    fn append(&self, record: &ResultRecord) -> Result<(), RecorderError> {
        validate(record)?;
        let row = record.to_csv_row();
        let mut file = self.file.lock().expect("recorder mutex poisoned");
        file.write_all(row.as_bytes())?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().expect("recorder mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("recorder mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemoryRecorder {
    fn append(&self, record: &ResultRecord) -> Result<(), RecorderError> {
        validate(record)?;
        self.records
            .lock()
            .expect("recorder mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}
