//! Schema and column types for tabular feature data

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::source::{IoError, IoResult};

/// Schema describing the structure of a dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Column descriptors, in file order
    pub columns: Vec<ColumnDescriptor>,

    /// Number of rows
    pub num_rows: usize,

    /// Additional metadata
    pub metadata: HashMap<String, String>,
}

impl Schema {
    /// Create a new schema
    pub fn new(columns: Vec<ColumnDescriptor>, num_rows: usize) -> Self {
        Self {
            columns,
            num_rows,
            metadata: HashMap::new(),
        }
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Descriptor for a column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Data type
    pub dtype: ColumnType,

    /// Description
    pub description: Option<String>,

    /// Whether the column can contain missing values
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Create a new column descriptor
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
            description: None,
            nullable: true,
        }
    }

    /// Set the description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set nullable
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Float64,
    Int64,
    Bool,
    Str,
    Unknown,
}

impl ColumnType {
    /// Check if this is a numeric type
    ///
    /// Booleans count as numeric: they widen to 0.0/1.0 when used
    /// as a model feature.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Float64 | ColumnType::Int64 | ColumnType::Bool
        )
    }

    /// Get the display name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Float64 => "float64",
            ColumnType::Int64 => "int64",
            ColumnType::Bool => "bool",
            ColumnType::Str => "string",
            ColumnType::Unknown => "unknown",
        }
    }
}

/// A column of data
///
/// Missing numeric values are represented as `NaN` in `Float64`
/// columns; `Int64` and `Bool` columns cannot hold missing values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Column {
    /// Get the column type
    pub fn dtype(&self) -> ColumnType {
        match self {
            Column::Float64(_) => ColumnType::Float64,
            Column::Int64(_) => ColumnType::Int64,
            Column::Bool(_) => ColumnType::Bool,
            Column::Str(_) => ColumnType::Str,
        }
    }

    /// Get the number of elements
    pub fn len(&self) -> usize {
        match self {
            Column::Float64(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    /// Check if the column is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to f64 values (for numeric types)
    ///
    /// Booleans widen to 0.0/1.0. Returns `None` for string columns.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float64(v) => Some(v.clone()),
            Column::Int64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Bool(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            Column::Str(_) => None,
        }
    }

    /// Get a single value as f64
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Column::Float64(v) => v.get(index).copied(),
            Column::Int64(v) => v.get(index).map(|&x| x as f64),
            Column::Bool(v) => v.get(index).map(|&b| if b { 1.0 } else { 0.0 }),
            Column::Str(_) => None,
        }
    }

    /// Keep only the rows where the mask is true
    pub fn filter(&self, mask: &[bool]) -> Column {
        fn keep<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask.iter())
                .filter_map(|(v, &m)| if m { Some(v.clone()) } else { None })
                .collect()
        }

        match self {
            Column::Float64(v) => Column::Float64(keep(v, mask)),
            Column::Int64(v) => Column::Int64(keep(v, mask)),
            Column::Bool(v) => Column::Bool(keep(v, mask)),
            Column::Str(v) => Column::Str(keep(v, mask)),
        }
    }
}

/// An ordered collection of named columns
///
/// Column order is preserved so output files match the order in which
/// columns were added.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    names: Vec<String>,
    columns: HashMap<String, Column>,
    num_rows: usize,
}

impl Frame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column to the frame
    ///
    /// The first column fixes the row count; later columns must match
    /// it. Pushing a column under an existing name replaces the data
    /// in place without changing the column order.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> IoResult<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.num_rows = column.len();
        } else if column.len() != self.num_rows {
            return Err(IoError::LengthMismatch {
                column: name,
                expected: self.num_rows,
                actual: column.len(),
            });
        }

        if !self.columns.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.columns.insert(name, column);
        Ok(())
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Check whether a column exists
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get column names in insertion order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    /// Check if the frame has no columns
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Derive a schema from the frame contents
    pub fn schema(&self) -> Schema {
        let columns = self
            .names
            .iter()
            .map(|name| ColumnDescriptor::new(name.clone(), self.columns[name].dtype()))
            .collect();
        Schema::new(columns, self.num_rows)
    }

    /// Keep only the rows where the mask is true
    ///
    /// The mask must have one entry per row; extra entries are ignored
    /// and missing entries drop the corresponding rows.
    pub fn filter_rows(&self, mask: &[bool]) -> Frame {
        let mut out = Frame::new();
        for name in &self.names {
            let filtered = self.columns[name].filter(mask);
            // Lengths agree by construction
            let _ = out.push_column(name.clone(), filtered);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_column_lookup() {
        let schema = Schema::new(
            vec![
                ColumnDescriptor::new("x", ColumnType::Float64),
                ColumnDescriptor::new("y", ColumnType::Int64),
            ],
            100,
        );

        assert_eq!(schema.column_index("x"), Some(0));
        assert_eq!(schema.column_index("y"), Some(1));
        assert_eq!(schema.column_index("z"), None);
        assert_eq!(schema.num_columns(), 2);
    }

    #[test]
    fn test_column_conversion() {
        let col = Column::Int64(vec![1, 2, 3]);
        assert_eq!(col.as_f64().unwrap(), vec![1.0, 2.0, 3.0]);

        let col = Column::Bool(vec![true, false]);
        assert_eq!(col.as_f64().unwrap(), vec![1.0, 0.0]);

        let col = Column::Str(vec!["a".to_string()]);
        assert!(col.as_f64().is_none());
    }

    #[test]
    fn test_column_type_properties() {
        assert!(ColumnType::Float64.is_numeric());
        assert!(ColumnType::Bool.is_numeric());
        assert!(!ColumnType::Str.is_numeric());
        assert_eq!(ColumnType::Int64.as_str(), "int64");
    }

    #[test]
    fn test_frame_preserves_order() {
        let mut frame = Frame::new();
        frame.push_column("b", Column::Float64(vec![1.0])).unwrap();
        frame.push_column("a", Column::Float64(vec![2.0])).unwrap();

        assert_eq!(frame.column_names(), &["b".to_string(), "a".to_string()]);
        assert_eq!(frame.num_rows(), 1);
    }

    #[test]
    fn test_frame_length_mismatch() {
        let mut frame = Frame::new();
        frame
            .push_column("a", Column::Float64(vec![1.0, 2.0]))
            .unwrap();
        let err = frame.push_column("b", Column::Float64(vec![1.0]));
        assert!(matches!(err, Err(IoError::LengthMismatch { .. })));
    }

    #[test]
    fn test_frame_replace_column() {
        let mut frame = Frame::new();
        frame.push_column("a", Column::Int64(vec![1, 2])).unwrap();
        frame
            .push_column("a", Column::Float64(vec![3.0, 4.0]))
            .unwrap();

        assert_eq!(frame.num_columns(), 1);
        assert_eq!(frame.column("a").unwrap().dtype(), ColumnType::Float64);
    }

    #[test]
    fn test_filter_rows() {
        let mut frame = Frame::new();
        frame
            .push_column("x", Column::Float64(vec![1.0, 2.0, 3.0]))
            .unwrap();
        frame
            .push_column("label", Column::Str(vec!["a".into(), "b".into(), "c".into()]))
            .unwrap();

        let filtered = frame.filter_rows(&[true, false, true]);
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(
            filtered.column("x").unwrap(),
            &Column::Float64(vec![1.0, 3.0])
        );
        assert_eq!(
            filtered.column("label").unwrap(),
            &Column::Str(vec!["a".to_string(), "c".to_string()])
        );
    }
}
