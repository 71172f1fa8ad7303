//! CSV output for frames
//!
//! `CsvSink` appends frames batch by batch, writing the header once,
//! so streaming pipelines never hold more than one batch in memory.

use crate::schema::{Column, Frame};
use crate::source::{IoError, IoResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Incremental CSV writer for frames
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header: Option<Vec<String>>,
}

impl CsvSink<File> {
    /// Create a sink writing to a file path
    pub fn create(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = File::create(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Create a sink writing to any writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            header: None,
        }
    }

    /// Append a frame
    ///
    /// The first frame fixes the header; later frames must carry the
    /// same columns in the same order.
    pub fn write_frame(&mut self, frame: &Frame) -> IoResult<()> {
        let names: Vec<String> = frame.column_names().to_vec();

        match &self.header {
            None => {
                self.writer
                    .write_record(&names)
                    .map_err(|e| IoError::Io(e.to_string()))?;
                self.header = Some(names.clone());
            }
            Some(header) if *header != names => {
                return Err(IoError::InvalidFormat(format!(
                    "batch columns {:?} do not match header {:?}",
                    names, header
                )));
            }
            Some(_) => {}
        }

        let columns: Vec<&Column> = names
            .iter()
            .map(|n| frame.column(n).expect("column names come from the frame"))
            .collect();

        for row in 0..frame.num_rows() {
            let record: Vec<String> = columns.iter().map(|c| format_cell(c, row)).collect();
            self.writer
                .write_record(&record)
                .map_err(|e| IoError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Flush buffered output
    pub fn flush(&mut self) -> IoResult<()> {
        self.writer.flush().map_err(|e| IoError::Io(e.to_string()))
    }
}

/// Write a whole frame to a file path
pub fn write_csv_path(frame: &Frame, path: impl AsRef<Path>) -> IoResult<()> {
    let mut sink = CsvSink::create(path)?;
    sink.write_frame(frame)?;
    sink.flush()
}

/// Format a single cell for CSV output
///
/// Missing values (NaN) become empty fields so a round trip through
/// `CsvSource` reproduces them.
fn format_cell(column: &Column, row: usize) -> String {
    match column {
        Column::Float64(v) => {
            let x = v[row];
            if x.is_nan() {
                String::new()
            } else {
                format!("{}", x)
            }
        }
        Column::Int64(v) => format!("{}", v[row]),
        Column::Bool(v) => format!("{}", v[row]),
        Column::Str(v) => v[row].clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::CsvSource;
    use crate::source::DataSource;

    fn sample_frame() -> Frame {
        let mut frame = Frame::new();
        frame
            .push_column("mass", Column::Float64(vec![1.5, f64::NAN]))
            .unwrap();
        frame.push_column("count", Column::Int64(vec![3, 4])).unwrap();
        frame
            .push_column("label", Column::Str(vec!["a".into(), "b".into()]))
            .unwrap();
        frame
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_csv_path(&sample_frame(), &path).unwrap();

        let source = CsvSource::open(path.to_str().unwrap()).unwrap();
        let schema = source.schema().unwrap();
        assert_eq!(schema.column_names(), vec!["mass", "count", "label"]);
        assert_eq!(schema.num_rows, 2);

        match source.read_column("mass").unwrap() {
            Column::Float64(v) => {
                assert_eq!(v[0], 1.5);
                assert!(v[1].is_nan());
            }
            other => panic!("expected float column, got {:?}", other),
        }
    }

    #[test]
    fn test_sink_batches_share_header() {
        let mut buffer = Vec::new();
        {
            let mut sink = CsvSink::new(&mut buffer);
            sink.write_frame(&sample_frame()).unwrap();
            sink.write_frame(&sample_frame()).unwrap();
            sink.flush().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        let header_count = text.lines().filter(|l| l.starts_with("mass,")).count();
        assert_eq!(header_count, 1);
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_sink_rejects_mismatched_columns() {
        let mut buffer = Vec::new();
        let mut sink = CsvSink::new(&mut buffer);
        sink.write_frame(&sample_frame()).unwrap();

        let mut other = Frame::new();
        other.push_column("x", Column::Int64(vec![1])).unwrap();
        assert!(matches!(
            sink.write_frame(&other),
            Err(IoError::InvalidFormat(_))
        ));
    }
}
