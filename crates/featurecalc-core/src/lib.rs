//! featurecalc-core - The feature calculation engine
//!
//! This crate ties the workspace together: declarative feature specs,
//! whole-column transforms, input/output validation, layered
//! configuration, result caching, and the `FeatureCalculator` engine
//! that runs feature sets over in-memory frames or streaming sources.
//!
//! ```no_run
//! use featurecalc_core::{CalcConfig, FeatureCalculator, FeatureSet};
//! use featurecalc_io::{CsvSource, DataSource};
//!
//! # fn main() -> featurecalc_core::Result<()> {
//! let engine = FeatureCalculator::new(CalcConfig::default())?;
//! let set = FeatureSet::load("features.yaml")?;
//! let source = CsvSource::open("data.csv")?;
//!
//! let mut frame = featurecalc_io::Frame::new();
//! for name in source.schema()?.column_names() {
//!     frame.push_column(name.to_string(), source.read_column(name)?)?;
//! }
//! let output = engine.batch_calculate(&frame, &set)?;
//! # let _ = output;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod calculator;
pub mod config;
pub mod error;
pub mod spec;
pub mod transform;
pub mod validate;

pub use cache::{CacheStats, ResultCache};
pub use calculator::{FeatureCalculator, StreamSummary};
pub use config::{CacheSettings, CalcConfig, ConfigError, Environment};
pub use error::{CalculationError, Result};
pub use spec::{
    FeatureBody, FeatureChecks, FeatureSet, FeatureSpec, FillStrategy, SpecError, TransformKind,
    TransformParams,
};
pub use transform::{CompiledTransform, TransformError};
pub use validate::{
    ColumnRule, FeatureValidator, FrameRule, NumericRule, StringRule, ValidationError,
    ValidationReport, Violation,
};
