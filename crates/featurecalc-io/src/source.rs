//! Data source trait and batch iteration
//!
//! The `DataSource` trait provides a uniform interface for reading
//! tabular data from files. Ranged batch reads are the unit of
//! streaming: callers that never ask for the full row range never
//! materialize the full dataset.

use crate::schema::{Column, Frame, Schema};
use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Debug, Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to open file: {0}")]
    OpenFailed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Type mismatch in column '{column}': expected {expected}, got '{actual}' at row {row}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
        row: usize,
    },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;

/// Trait for reading tabular data from a file format
pub trait DataSource: Send + Sync {
    /// Get the schema (column names, types, row count)
    fn schema(&self) -> IoResult<Schema>;

    /// Total number of rows
    fn num_rows(&self) -> usize;

    /// Read a single column in full
    fn read_column(&self, name: &str) -> IoResult<Column>;

    /// Read a range of rows (all columns)
    ///
    /// A range past the end of the data yields a truncated (possibly
    /// empty) frame rather than an error.
    fn read_batch(&self, start: usize, len: usize) -> IoResult<Frame>;

    /// Get the file path (if applicable)
    fn path(&self) -> Option<&str> {
        None
    }

    /// Get the format name
    fn format_name(&self) -> &'static str;
}

/// A boxed source for dynamic dispatch
pub type BoxedSource = Box<dyn DataSource>;

/// Open a file and return an appropriate source
///
/// The format is auto-detected from the file extension.
pub fn open_path(path: &str) -> IoResult<BoxedSource> {
    let extension = path
        .rsplit('.')
        .next()
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => {
            use crate::csv_reader::CsvSource;
            Ok(Box::new(CsvSource::open(path)?))
        }
        "tsv" => {
            use crate::csv_reader::CsvSource;
            Ok(Box::new(CsvSource::open_with_options(path, b'\t', true)?))
        }
        _ => Err(IoError::InvalidFormat(format!(
            "Unknown file extension: {}",
            extension
        ))),
    }
}

/// Iterator over fixed-size row batches of a source
pub struct BatchIter<'a> {
    source: &'a dyn DataSource,
    batch_size: usize,
    position: usize,
    total: usize,
}

impl<'a> BatchIter<'a> {
    /// Create a batch iterator over a source
    pub fn new(source: &'a dyn DataSource, batch_size: usize) -> Self {
        let total = source.num_rows();
        Self {
            source,
            batch_size: batch_size.max(1),
            position: 0,
            total,
        }
    }
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = IoResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total {
            return None;
        }
        let len = self.batch_size.min(self.total - self.position);
        let batch = self.source.read_batch(self.position, len);
        self.position += len;
        Some(batch)
    }
}

/// Iterate a source in batches of the given size
pub fn batches(source: &dyn DataSource, batch_size: usize) -> BatchIter<'_> {
    BatchIter::new(source, batch_size)
}
