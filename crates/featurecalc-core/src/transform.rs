//! Column transforms
//!
//! Transforms are compiled against the full source column first, so
//! the statistics they capture (mean, percentile bounds, fill values)
//! do not depend on how rows are later chunked or streamed. The
//! compiled form applies row by row.

use featurecalc_stats::{percentile, StatsError, Summary};
use thiserror::Error;

use crate::spec::{FillStrategy, TransformKind, TransformParams};

/// Transform errors
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Transform '{transform}' requires parameter '{param}'")]
    MissingParam {
        transform: &'static str,
        param: &'static str,
    },

    #[error("Invalid parameters for transform '{transform}': {message}")]
    InvalidParam {
        transform: &'static str,
        message: String,
    },

    #[error("Cannot apply '{transform}' to a column with no finite values")]
    EmptyColumn { transform: &'static str },
}

/// A transform compiled against its source column
///
/// `compile` captures whatever whole-column statistics the transform
/// needs; `apply` is then a pure per-value function.
#[derive(Debug, Clone)]
pub enum CompiledTransform {
    ZScore { mean: f64, std_dev: f64 },
    RobustZScore { median: f64, mad: f64 },
    MinMax { min: f64, range: f64 },
    Log,
    Log10,
    Sqrt,
    Abs,
    Winsorize { lower: f64, upper: f64 },
    Clip { min: Option<f64>, max: Option<f64> },
    Fill { value: f64 },
}

impl CompiledTransform {
    /// Compile a transform against its source column
    pub fn compile(
        kind: TransformKind,
        params: &TransformParams,
        source: &[f64],
    ) -> Result<Self, TransformError> {
        match kind {
            TransformKind::ZScore => {
                let stats = Summary::from_values(source);
                Ok(CompiledTransform::ZScore {
                    mean: stats.mean,
                    std_dev: stats.std_dev,
                })
            }

            TransformKind::RobustZScore => {
                let stats = Summary::from_values(source);
                Ok(CompiledTransform::RobustZScore {
                    median: stats.median,
                    mad: stats.mad,
                })
            }

            TransformKind::MinMax => {
                let stats = Summary::from_values(source);
                if stats.count == 0 {
                    return Err(TransformError::EmptyColumn {
                        transform: kind.as_str(),
                    });
                }
                Ok(CompiledTransform::MinMax {
                    min: stats.min,
                    range: stats.range(),
                })
            }

            TransformKind::Log => Ok(CompiledTransform::Log),
            TransformKind::Log10 => Ok(CompiledTransform::Log10),
            TransformKind::Sqrt => Ok(CompiledTransform::Sqrt),
            TransformKind::Abs => Ok(CompiledTransform::Abs),

            TransformKind::Winsorize => {
                let pct = params.pct.unwrap_or(5.0);
                if !(0.0..50.0).contains(&pct) {
                    return Err(TransformError::InvalidParam {
                        transform: kind.as_str(),
                        message: format!("pct {} must be in [0, 50)", pct),
                    });
                }
                let lower = percentile(source, pct).map_err(|e| match e {
                    StatsError::EmptyInput => TransformError::EmptyColumn {
                        transform: kind.as_str(),
                    },
                    other => TransformError::Stats(other),
                })?;
                let upper = percentile(source, 100.0 - pct)?;
                Ok(CompiledTransform::Winsorize { lower, upper })
            }

            TransformKind::Clip => {
                if params.min.is_none() && params.max.is_none() {
                    return Err(TransformError::MissingParam {
                        transform: kind.as_str(),
                        param: "min or max",
                    });
                }
                Ok(CompiledTransform::Clip {
                    min: params.min,
                    max: params.max,
                })
            }

            TransformKind::FillMissing => {
                let strategy = params.strategy.unwrap_or(FillStrategy::Mean);
                let value = match strategy {
                    FillStrategy::Zero => 0.0,
                    FillStrategy::Value => params.value.ok_or(TransformError::MissingParam {
                        transform: kind.as_str(),
                        param: "value",
                    })?,
                    FillStrategy::Mean | FillStrategy::Median => {
                        let stats = Summary::from_values(source);
                        if stats.count == 0 {
                            return Err(TransformError::EmptyColumn {
                                transform: kind.as_str(),
                            });
                        }
                        if strategy == FillStrategy::Mean {
                            stats.mean
                        } else {
                            stats.median
                        }
                    }
                };
                Ok(CompiledTransform::Fill { value })
            }
        }
    }

    /// Apply the transform to a single value
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            CompiledTransform::ZScore { mean, std_dev } => {
                if !x.is_finite() {
                    f64::NAN
                } else if *std_dev == 0.0 {
                    0.0
                } else {
                    (x - mean) / std_dev
                }
            }

            CompiledTransform::RobustZScore { median, mad } => {
                if !x.is_finite() {
                    f64::NAN
                } else if *mad == 0.0 {
                    0.0
                } else {
                    (x - median) / (1.4826 * mad)
                }
            }

            CompiledTransform::MinMax { min, range } => {
                if !x.is_finite() {
                    f64::NAN
                } else if *range == 0.0 {
                    0.5
                } else {
                    (x - min) / range
                }
            }

            CompiledTransform::Log => x.ln(),
            CompiledTransform::Log10 => x.log10(),
            CompiledTransform::Sqrt => x.sqrt(),
            CompiledTransform::Abs => x.abs(),

            CompiledTransform::Winsorize { lower, upper } => {
                if !x.is_finite() {
                    x
                } else {
                    x.clamp(*lower, *upper)
                }
            }

            CompiledTransform::Clip { min, max } => {
                let mut out = x;
                if let Some(min) = min {
                    if out < *min {
                        out = *min;
                    }
                }
                if let Some(max) = max {
                    if out > *max {
                        out = *max;
                    }
                }
                out
            }

            CompiledTransform::Fill { value } => {
                if x.is_finite() {
                    x
                } else {
                    *value
                }
            }
        }
    }
}
