//! Parquet Batch Writer
//!
//! Serializes one drained batch into a single compressed columnar file at
//! `{root}/{instrument}/{category}/{YYYY-MM-DD}.parquet`. The Arrow schema
//! is inferred from the batch itself, so heterogeneous record shapes within
//! a batch surface as a write error rather than a silently mangled file.
//!
//! One flush per day is assumed; writing the same (key, date) twice replaces
//! the file with only the later batch.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::json::ReaderBuilder;
use arrow::json::reader::infer_json_schema_from_iterator;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::domain::catalog::StreamKey;
use crate::infrastructure::buffer::Record;

/// Filename extension for output files.
pub const FILE_EXTENSION: &str = "parquet";

/// Errors writing a batch. Non-fatal: the flush continues for other keys.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The batch contains no records; there is nothing to write.
    #[error("batch is empty")]
    EmptyBatch,

    /// A record is not a JSON object and cannot become a columnar row.
    #[error("record at index {0} is not a JSON object")]
    NotAnObject(usize),

    /// Schema inference or JSON-to-Arrow decoding failed, typically because
    /// record shapes within the batch are incompatible.
    #[error("failed to convert batch to Arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding failed.
    #[error("failed to encode Parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Directory creation or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes drained batches as date-named Parquet files under a storage root.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    root: PathBuf,
}

impl BatchWriter {
    /// Create a writer rooted at `root`. The root itself is created lazily
    /// on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output path for a (key, date) pair.
    #[must_use]
    pub fn file_path(&self, key: &StreamKey, date: NaiveDate) -> PathBuf {
        self.root
            .join(&key.instrument)
            .join(&key.category)
            .join(format!("{}.{FILE_EXTENSION}", date.format("%Y-%m-%d")))
    }

    /// Write one batch to its date-named file, creating the per-instrument
    /// and per-category directories if needed (idempotent).
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] on empty batches, non-object records,
    /// incompatible record shapes, or any I/O failure. The buffer entry was
    /// already cleared at drain time, so a failed batch is lost; the caller
    /// logs and continues with the remaining keys.
    pub fn write_batch(
        &self,
        key: &StreamKey,
        date: NaiveDate,
        records: &[Record],
    ) -> Result<PathBuf, WriteError> {
        if records.is_empty() {
            return Err(WriteError::EmptyBatch);
        }
        if let Some(index) = records.iter().position(|r| !r.is_object()) {
            return Err(WriteError::NotAnObject(index));
        }

        let path = self.file_path(key, date);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let batch = records_to_arrow(records)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build();
        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(path)
    }

    /// The storage root this writer targets.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Convert a batch of JSON records into a single Arrow record batch.
fn records_to_arrow(records: &[Record]) -> Result<arrow::array::RecordBatch, WriteError> {
    let schema = infer_json_schema_from_iterator(
        records.iter().map(Ok::<_, arrow::error::ArrowError>),
    )?;

    let mut decoder = ReaderBuilder::new(Arc::new(schema)).build_decoder()?;
    decoder.serialize(records)?;
    decoder.flush()?.ok_or(WriteError::EmptyBatch)
}

// =============================================================================
// Tests
// =============================================================================
