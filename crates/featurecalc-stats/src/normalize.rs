//! Normalization and rescaling helpers

use crate::summary::{percentile, StatsError, Summary};

/// Rescale values to the [0, 1] range
///
/// A zero-range (constant) column maps every finite value to 0.5.
/// Non-finite values pass through unchanged. Input with no finite
/// values is an error.
pub fn min_max_normalize(values: &[f64]) -> Result<Vec<f64>, StatsError> {
    let stats = Summary::from_values(values);
    if stats.count == 0 {
        return Err(StatsError::EmptyInput);
    }

    let range = stats.range();
    Ok(values
        .iter()
        .map(|&x| {
            if !x.is_finite() {
                x
            } else if range == 0.0 {
                0.5
            } else {
                (x - stats.min) / range
            }
        })
        .collect())
}

/// Compute z-scores for an entire column
pub fn zscore_batch(values: &[f64]) -> Vec<f64> {
    let stats = Summary::from_values(values);
    values.iter().map(|&x| stats.zscore(x)).collect()
}

/// Compute robust z-scores for an entire column
pub fn robust_zscore_batch(values: &[f64]) -> Vec<f64> {
    let stats = Summary::from_values(values);
    values.iter().map(|&x| stats.robust_zscore(x)).collect()
}

/// Winsorize values at a given percentile
///
/// Values below the `pct` percentile are raised to it, values above
/// the `100 - pct` percentile are lowered to it. Non-finite values
/// pass through unchanged.
pub fn winsorize(values: &[f64], pct: f64) -> Result<Vec<f64>, StatsError> {
    if !(0.0..50.0).contains(&pct) {
        return Err(StatsError::InvalidPercentile(pct));
    }
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let lower = percentile(values, pct)?;
    let upper = percentile(values, 100.0 - pct)?;

    Ok(values
        .iter()
        .map(|&x| {
            if !x.is_finite() {
                x
            } else {
                x.clamp(lower, upper)
            }
        })
        .collect())
}
