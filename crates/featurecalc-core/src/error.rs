//! Error types for feature calculation

use thiserror::Error;

use crate::config::ConfigError;
use crate::spec::SpecError;
use crate::transform::TransformError;
use crate::validate::ValidationError;

/// Result type alias for calculation operations
pub type Result<T> = std::result::Result<T, CalculationError>;

/// Main error type for feature calculation
#[derive(Error, Debug)]
pub enum CalculationError {
    /// Feature spec errors
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    /// Expression parse errors
    #[error("Expression error: {0}")]
    Parse(#[from] featurecalc_expr::ParseError),

    /// Expression evaluation errors
    #[error("Evaluation error: {0}")]
    Eval(#[from] featurecalc_expr::EvalError),

    /// Statistics errors
    #[error("Statistics error: {0}")]
    Stats(#[from] featurecalc_stats::StatsError),

    /// Transform errors
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Data I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] featurecalc_io::IoError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Feature validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced column does not exist
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A referenced column exists but is not numeric
    #[error("Column '{column}' is not numeric (type {dtype})")]
    NotNumeric {
        column: String,
        dtype: &'static str,
    },

    /// A feature set cannot run in streaming mode
    #[error("Cannot stream feature set: {0}")]
    Streaming(String),
}
