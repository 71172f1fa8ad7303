//! featurecalc-io - Data I/O for the feature calculator
//!
//! This crate provides the columnar data model shared by the engine
//! and its file I/O:
//!
//! - **Schema / Frame**: typed, ordered columns with NaN-as-missing
//! - **DataSource**: uniform reader interface with ranged batch reads
//! - **CsvSource / CsvSink**: CSV input with type inference, and
//!   incremental CSV output

pub mod csv_reader;
pub mod schema;
pub mod source;
pub mod writer;

pub use csv_reader::CsvSource;
pub use schema::{Column, ColumnDescriptor, ColumnType, Frame, Schema};
pub use source::{batches, open_path, BatchIter, BoxedSource, DataSource, IoError, IoResult};
pub use writer::{write_csv_path, CsvSink};
