//! Summary statistics for numeric columns
//!
//! Provides the statistical summaries the engine and transforms rely
//! on: mean, variance, standard deviation, min, max, sum, and the
//! robust pair (median, MAD). Non-finite values are treated as
//! missing throughout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from statistics helpers
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Cannot compute statistics for empty input")]
    EmptyInput,

    #[error("Invalid percentile: {0} (expected 0 to 100)")]
    InvalidPercentile(f64),
}

/// Summary statistics for a numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Number of finite values
    pub count: usize,
    /// Number of missing (non-finite) values
    pub missing: usize,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Sum of values
    pub sum: f64,
    /// Mean (average)
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Standard deviation
    pub std_dev: f64,
    /// Median (50th percentile)
    pub median: f64,
    /// Median Absolute Deviation
    pub mad: f64,
}

impl Summary {
    /// Compute summary statistics from values
    pub fn from_values(values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        let missing = values.len() - finite.len();

        if finite.is_empty() {
            return Self::empty(missing);
        }

        let count = finite.len();
        let sum: f64 = finite.iter().sum();
        let mean = sum / count as f64;

        let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let std_dev = variance.sqrt();

        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = finite;
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = median_of_sorted(&sorted);

        let mut deviations: Vec<f64> = sorted.iter().map(|x| (x - median).abs()).collect();
        deviations.sort_by(|a, b| a.total_cmp(b));
        let mad = median_of_sorted(&deviations);

        Self {
            count,
            missing,
            min,
            max,
            sum,
            mean,
            variance,
            std_dev,
            median,
            mad,
        }
    }

    /// Create empty statistics (all NaN)
    fn empty(missing: usize) -> Self {
        Self {
            count: 0,
            missing,
            min: f64::NAN,
            max: f64::NAN,
            sum: f64::NAN,
            mean: f64::NAN,
            variance: f64::NAN,
            std_dev: f64::NAN,
            median: f64::NAN,
            mad: f64::NAN,
        }
    }

    /// Get the range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Fraction of values that are missing
    pub fn missing_ratio(&self) -> f64 {
        let total = self.count + self.missing;
        if total == 0 {
            0.0
        } else {
            self.missing as f64 / total as f64
        }
    }

    /// Compute z-score for a value
    ///
    /// Zero standard deviation maps every value to 0.0.
    pub fn zscore(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return f64::NAN;
        }
        if self.std_dev == 0.0 {
            return 0.0;
        }
        (x - self.mean) / self.std_dev
    }

    /// Compute robust z-score using median and MAD
    ///
    /// Uses (x - median) / (1.4826 * MAD); the constant makes it
    /// comparable to the standard z-score for normal data.
    pub fn robust_zscore(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return f64::NAN;
        }
        if self.mad == 0.0 {
            return 0.0;
        }
        (x - self.median) / (1.4826 * self.mad)
    }

    /// Check if a value is an outlier (|z| > 3)
    pub fn is_outlier(&self, x: f64) -> bool {
        self.zscore(x).abs() > 3.0
    }

    /// Check if a value is a robust outlier (|robust z| > 3)
    pub fn is_robust_outlier(&self, x: f64) -> bool {
        self.robust_zscore(x).abs() > 3.0
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Compute a percentile (0 to 100) with linear interpolation
///
/// Non-finite values are ignored; empty input is an error.
pub fn percentile(values: &[f64], p: f64) -> Result<f64, StatsError> {
    if !(0.0..=100.0).contains(&p) {
        return Err(StatsError::InvalidPercentile(p));
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank.fract();

    Ok(sorted[lower] * (1.0 - frac) + sorted[upper] * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_basic() {
        let data: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let stats = Summary::from_values(&data);

        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.sum, 55.0);
        assert!((stats.mean - 5.5).abs() < 1e-10);
        assert!((stats.median - 5.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_with_nan() {
        let data = vec![1.0, 2.0, f64::NAN, 4.0, 5.0];
        let stats = Summary::from_values(&data);

        assert_eq!(stats.count, 4);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.missing_ratio() - 0.2).abs() < 1e-10);
    }

    #[test]
    fn test_summary_all_missing() {
        let data = vec![f64::NAN, f64::INFINITY];
        let stats = Summary::from_values(&data);

        assert_eq!(stats.count, 0);
        assert_eq!(stats.missing, 2);
        assert!(stats.mean.is_nan());
        assert!(stats.sum.is_nan());
    }

    #[test]
    fn test_zscore() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = Summary::from_values(&data);

        assert!((stats.zscore(3.0)).abs() < 1e-10);
        assert!(stats.zscore(f64::NAN).is_nan());
    }

    #[test]
    fn test_zscore_constant_column() {
        let stats = Summary::from_values(&[2.0, 2.0, 2.0]);
        assert_eq!(stats.zscore(2.0), 0.0);
        assert_eq!(stats.zscore(5.0), 0.0);
    }

    #[test]
    fn test_robust_zscore_flags_outlier() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let stats = Summary::from_values(&data);

        assert!(stats.robust_zscore(100.0) > 3.0);
        assert!(stats.is_robust_outlier(100.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = vec![0.0, 10.0];
        assert!((percentile(&data, 50.0).unwrap() - 5.0).abs() < 1e-10);
        assert_eq!(percentile(&data, 0.0).unwrap(), 0.0);
        assert_eq!(percentile(&data, 100.0).unwrap(), 10.0);
    }

    #[test]
    fn test_percentile_errors() {
        assert!(matches!(
            percentile(&[], 50.0),
            Err(StatsError::EmptyInput)
        ));
        assert!(matches!(
            percentile(&[1.0], 101.0),
            Err(StatsError::InvalidPercentile(_))
        ));
    }
}
