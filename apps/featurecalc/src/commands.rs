//! Command handlers for the featurecalc CLI

use anyhow::{bail, Context, Result};
use std::path::Path;

use featurecalc_core::{CalcConfig, FeatureCalculator, FeatureSet, FeatureValidator};
use featurecalc_io::{open_path, BoxedSource, CsvSink, DataSource, Frame};
use featurecalc_stats::Summary;

/// Compute features and write the output as CSV
pub fn compute(
    config: &CalcConfig,
    data: &Path,
    spec: &Path,
    output: Option<&Path>,
    streaming: bool,
) -> Result<()> {
    let set = load_spec(spec)?;
    let source = open_source(data)?;
    let engine = FeatureCalculator::new(config.clone())?;

    if streaming {
        match output {
            Some(path) => {
                let mut sink = CsvSink::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                engine.calculate_streaming(source.as_ref(), &set, |batch| {
                    sink.write_frame(batch)
                })?;
                sink.flush()?;
            }
            None => {
                let stdout = std::io::stdout();
                let mut sink = CsvSink::new(stdout.lock());
                engine.calculate_streaming(source.as_ref(), &set, |batch| {
                    sink.write_frame(batch)
                })?;
                sink.flush()?;
            }
        }
    } else {
        let frame = load_frame(source.as_ref())?;
        let result = engine.batch_calculate(&frame, &set)?;
        write_output(&result, output)?;
    }

    if let Some(stats) = engine.cache_stats() {
        tracing::debug!(
            "Cache: {} hits, {} misses, {} entries",
            stats.hits,
            stats.misses,
            stats.entries
        );
    }
    Ok(())
}

/// Compute features and check them against the spec's rules
pub fn validate(config: &CalcConfig, data: &Path, spec: &Path) -> Result<()> {
    let set = load_spec(spec)?;
    let source = open_source(data)?;
    let frame = load_frame(source.as_ref())?;

    let engine = FeatureCalculator::new(config.clone())?;
    let result = engine.batch_calculate(&frame, &set)?;

    let report = FeatureValidator::new().validate(&result, &set);
    if report.is_ok() {
        println!(
            "OK: {} features over {} rows passed validation",
            set.features.len(),
            result.num_rows()
        );
        return Ok(());
    }

    for violation in &report.violations {
        println!("{}", violation);
    }
    bail!("validation failed with {} violation(s)", report.len());
}

/// Print summary statistics per numeric column
pub fn stats(data: &Path, column: Option<&str>) -> Result<()> {
    let source = open_source(data)?;
    let schema = source.schema()?;

    let names: Vec<&str> = match column {
        Some(name) => {
            let descriptor = schema
                .column(name)
                .with_context(|| format!("no column '{}' in {}", name, data.display()))?;
            if !descriptor.dtype.is_numeric() {
                bail!(
                    "column '{}' is not numeric (type {})",
                    name,
                    descriptor.dtype.as_str()
                );
            }
            vec![name]
        }
        None => schema
            .columns
            .iter()
            .filter(|c| c.dtype.is_numeric())
            .map(|c| c.name.as_str())
            .collect(),
    };

    if names.is_empty() {
        bail!("no numeric columns in {}", data.display());
    }

    for name in names {
        let values = source
            .read_column(name)?
            .as_f64()
            .expect("numeric columns convert to f64");
        let summary = Summary::from_values(&values);
        println!("{}:", name);
        println!("  count    {}", summary.count);
        println!("  missing  {}", summary.missing);
        println!("  min      {}", summary.min);
        println!("  max      {}", summary.max);
        println!("  sum      {}", summary.sum);
        println!("  mean     {}", summary.mean);
        println!("  std_dev  {}", summary.std_dev);
        println!("  median   {}", summary.median);
        println!("  mad      {}", summary.mad);
    }
    Ok(())
}

/// Print the inferred schema of a data file
pub fn schema(data: &Path) -> Result<()> {
    let source = open_source(data)?;
    let schema = source.schema()?;

    println!(
        "{}: {} rows, {} columns ({})",
        data.display(),
        schema.num_rows,
        schema.num_columns(),
        source.format_name()
    );
    for descriptor in &schema.columns {
        println!(
            "  {:<24} {:<8} {}",
            descriptor.name,
            descriptor.dtype.as_str(),
            if descriptor.nullable {
                "nullable"
            } else {
                "required"
            }
        );
    }
    Ok(())
}

fn load_spec(path: &Path) -> Result<FeatureSet> {
    let set = FeatureSet::load(path)
        .with_context(|| format!("failed to load feature set from {}", path.display()))?;
    set.validate()
        .with_context(|| format!("invalid feature set in {}", path.display()))?;
    Ok(set)
}

fn open_source(path: &Path) -> Result<BoxedSource> {
    let path = path
        .to_str()
        .with_context(|| format!("non-UTF-8 path: {}", path.display()))?;
    open_path(path).with_context(|| format!("failed to open {}", path))
}

/// Materialize every column of a source into a frame
fn load_frame(source: &dyn DataSource) -> Result<Frame> {
    let schema = source.schema()?;
    let mut frame = Frame::new();
    for name in schema.column_names() {
        frame.push_column(name.to_string(), source.read_column(name)?)?;
    }
    Ok(frame)
}

fn write_output(frame: &Frame, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            featurecalc_io::write_csv_path(frame, path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                "Wrote {} rows x {} columns to {}",
                frame.num_rows(),
                frame.num_columns(),
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            let mut sink = CsvSink::new(stdout.lock());
            sink.write_frame(frame)?;
            sink.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const DATA: &str = "mass,count\n1,10\n2,20\n3,30\n4,40\n5,50\n";

    const SPEC: &str = "
features:
  - name: double
    expr: \"mass * 2\"
  - name: mass_z
    transform: zscore
    source: mass
";

    #[test]
    fn test_compute_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", DATA);
        let spec = write_file(dir.path(), "features.yaml", SPEC);
        let output = dir.path().join("out.csv");

        compute(&CalcConfig::default(), &data, &spec, Some(&output), false).unwrap();

        let text = fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("mass,count,double,mass_z"));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_compute_streaming_matches_batch() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", DATA);
        let spec = write_file(dir.path(), "features.yaml", SPEC);
        let batch_out = dir.path().join("batch.csv");
        let stream_out = dir.path().join("stream.csv");

        let config = CalcConfig {
            batch_size: 2,
            ..CalcConfig::default()
        };
        compute(&config, &data, &spec, Some(&batch_out), false).unwrap();
        compute(&config, &data, &spec, Some(&stream_out), true).unwrap();

        assert_eq!(
            fs::read_to_string(&batch_out).unwrap(),
            fs::read_to_string(&stream_out).unwrap()
        );
    }

    #[test]
    fn test_compute_rejects_bad_spec() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", DATA);
        let spec = write_file(
            dir.path(),
            "features.yaml",
            "features:\n  - name: broken\n    expr: \"mass +\"\n",
        );

        let result = compute(&CalcConfig::default(), &data, &spec, None, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_reports_violations() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", DATA);
        let spec = write_file(
            dir.path(),
            "features.yaml",
            "
features:
  - name: neg
    expr: \"0 - mass\"
    checks:
      min: 0
",
        );

        let err = validate(&CalcConfig::default(), &data, &spec).unwrap_err();
        assert!(err.to_string().contains("violation"));
    }

    #[test]
    fn test_validate_passes_clean_features() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", DATA);
        let spec = write_file(
            dir.path(),
            "features.yaml",
            "
features:
  - name: pos
    expr: \"mass\"
    checks:
      min: 0
      allow_nan: false
",
        );

        validate(&CalcConfig::default(), &data, &spec).unwrap();
    }

    #[test]
    fn test_stats_rejects_string_column() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", "label\na\nb\n");
        assert!(stats(&data, Some("label")).is_err());
        assert!(stats(&data, None).is_err());
    }

    #[test]
    fn test_load_frame_carries_all_columns() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_file(dir.path(), "data.csv", DATA);

        let source = open_source(&data).unwrap();
        let frame = load_frame(source.as_ref()).unwrap();
        assert_eq!(frame.column_names(), &["mass", "count"]);
        assert_eq!(frame.num_rows(), 5);
    }
}
