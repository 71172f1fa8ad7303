//! CSV data source with type inference

use crate::schema::{Column, ColumnDescriptor, ColumnType, Frame, Schema};
use crate::source::{DataSource, IoError, IoResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Number of rows sampled for type inference
const INFERENCE_SAMPLE_ROWS: usize = 100;

/// CSV file source
pub struct CsvSource {
    path: String,
    schema: Schema,
    delimiter: u8,
    has_header: bool,
}

impl CsvSource {
    /// Open a CSV file with a comma delimiter and a header row
    pub fn open(path: &str) -> IoResult<Self> {
        Self::open_with_options(path, b',', true)
    }

    /// Open a CSV file with options
    pub fn open_with_options(path: &str, delimiter: u8, has_header: bool) -> IoResult<Self> {
        if !Path::new(path).exists() {
            return Err(IoError::FileNotFound(path.to_string()));
        }

        let mut reader = Self::make_reader(path, delimiter, has_header)?;
        let schema = Self::infer_schema(&mut reader, has_header)?;

        Ok(Self {
            path: path.to_string(),
            schema,
            delimiter,
            has_header,
        })
    }

    fn make_reader(
        path: &str,
        delimiter: u8,
        has_header: bool,
    ) -> IoResult<csv::Reader<BufReader<File>>> {
        let file = File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
        Ok(csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_header)
            .from_reader(BufReader::new(file)))
    }

    fn reopen(&self) -> IoResult<csv::Reader<BufReader<File>>> {
        Self::make_reader(&self.path, self.delimiter, self.has_header)
    }

    fn infer_schema(
        reader: &mut csv::Reader<BufReader<File>>,
        has_header: bool,
    ) -> IoResult<Schema> {
        let headers: Vec<String> = if has_header {
            reader
                .headers()
                .map_err(|e| IoError::InvalidFormat(e.to_string()))?
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            Vec::new()
        };

        let mut sample: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut num_rows = 0;

        for result in reader.records() {
            let record = result.map_err(|e| IoError::InvalidFormat(e.to_string()))?;

            // Header-less files take their width from the first record
            if sample.is_empty() {
                sample = vec![Vec::new(); record.len()];
            }
            if record.len() != sample.len() {
                return Err(IoError::InvalidFormat(format!(
                    "record {} has {} fields, expected {}",
                    num_rows,
                    record.len(),
                    sample.len()
                )));
            }

            if num_rows < INFERENCE_SAMPLE_ROWS {
                for (i, value) in record.iter().enumerate() {
                    sample[i].push(value.to_string());
                }
            }
            num_rows += 1;
        }

        let names: Vec<String> = if headers.is_empty() {
            (0..sample.len()).map(|i| format!("col_{}", i)).collect()
        } else {
            headers
        };

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let (dtype, nullable) = infer_type(&sample[i]);
                ColumnDescriptor::new(name, dtype).with_nullable(nullable)
            })
            .collect();

        Ok(Schema::new(columns, num_rows))
    }

    fn descriptor(&self, name: &str) -> IoResult<(usize, &ColumnDescriptor)> {
        let index = self
            .schema
            .column_index(name)
            .ok_or_else(|| IoError::ColumnNotFound(name.to_string()))?;
        Ok((index, &self.schema.columns[index]))
    }
}

impl DataSource for CsvSource {
    fn schema(&self) -> IoResult<Schema> {
        Ok(self.schema.clone())
    }

    fn num_rows(&self) -> usize {
        self.schema.num_rows
    }

    fn read_column(&self, name: &str) -> IoResult<Column> {
        let (index, descriptor) = self.descriptor(name)?;
        let dtype = descriptor.dtype;

        let mut reader = self.reopen()?;
        let mut values = Vec::with_capacity(self.schema.num_rows);
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|e| IoError::InvalidFormat(e.to_string()))?;
            let field = record.get(index).unwrap_or("");
            values.push((row, field.to_string()));
        }

        parse_column(name, dtype, values.into_iter())
    }

    fn read_batch(&self, start: usize, len: usize) -> IoResult<Frame> {
        let mut reader = self.reopen()?;
        let mut fields: Vec<Vec<(usize, String)>> = vec![Vec::new(); self.schema.num_columns()];

        for (row, result) in reader.records().enumerate() {
            if row < start {
                continue;
            }
            if row >= start + len {
                break;
            }
            let record = result.map_err(|e| IoError::InvalidFormat(e.to_string()))?;
            for (i, value) in record.iter().enumerate() {
                fields[i].push((row, value.to_string()));
            }
        }

        let mut frame = Frame::new();
        for (i, descriptor) in self.schema.columns.iter().enumerate() {
            let column = parse_column(
                &descriptor.name,
                descriptor.dtype,
                std::mem::take(&mut fields[i]).into_iter(),
            )?;
            frame.push_column(descriptor.name.clone(), column)?;
        }
        Ok(frame)
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}

/// Infer a column type from sample values
///
/// Returns the type and whether empty (missing) fields were seen.
fn infer_type(values: &[String]) -> (ColumnType, bool) {
    let non_empty: Vec<&str> = values
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    let nullable = non_empty.len() != values.len();

    if non_empty.is_empty() {
        return (ColumnType::Str, nullable);
    }

    if non_empty.iter().all(|s| s.parse::<i64>().is_ok()) {
        // Missing values force integers up to float, where NaN exists
        let dtype = if nullable {
            ColumnType::Float64
        } else {
            ColumnType::Int64
        };
        return (dtype, nullable);
    }

    if non_empty.iter().all(|s| s.parse::<f64>().is_ok()) {
        return (ColumnType::Float64, nullable);
    }

    if non_empty.iter().all(|s| {
        matches!(
            s.to_lowercase().as_str(),
            "true" | "false" | "yes" | "no"
        )
    }) {
        return (ColumnType::Bool, nullable);
    }

    (ColumnType::Str, nullable)
}

/// Parse raw fields into a typed column
fn parse_column(
    name: &str,
    dtype: ColumnType,
    values: impl Iterator<Item = (usize, String)>,
) -> IoResult<Column> {
    match dtype {
        ColumnType::Float64 => Ok(Column::Float64(
            values
                .map(|(_, s)| {
                    if s.is_empty() {
                        f64::NAN
                    } else {
                        s.parse().unwrap_or(f64::NAN)
                    }
                })
                .collect(),
        )),
        ColumnType::Int64 => {
            let mut out = Vec::new();
            for (row, s) in values {
                let parsed = s.parse::<i64>().map_err(|_| IoError::TypeMismatch {
                    column: name.to_string(),
                    expected: "int64".to_string(),
                    actual: s.clone(),
                    row,
                })?;
                out.push(parsed);
            }
            Ok(Column::Int64(out))
        }
        ColumnType::Bool => Ok(Column::Bool(
            values
                .map(|(_, s)| matches!(s.to_lowercase().as_str(), "true" | "yes"))
                .collect(),
        )),
        ColumnType::Str | ColumnType::Unknown => {
            Ok(Column::Str(values.map(|(_, s)| s).collect()))
        }
    }
}
