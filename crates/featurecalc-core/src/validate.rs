//! Data and feature validation
//!
//! Two layers of validation:
//!
//! - `FrameRule` checks input data before calculation (required
//!   columns, per-column numeric/string rules). A rule reports the
//!   first offending row per column.
//! - `FeatureValidator` checks computed output against each spec's
//!   `checks` block.

use featurecalc_io::{Column, Frame};
use serde::Serialize;
use thiserror::Error;

use crate::spec::FeatureSet;

/// A single validation violation
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// Offending column
    pub column: String,
    /// Offending row, when the violation is row-level
    pub row: Option<usize>,
    /// Human-readable detail
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} (row {}): {}", self.column, row, self.message),
            None => write!(f, "{}: {}", self.column, self.message),
        }
    }
}

/// The outcome of a validation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Every violation found
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Check whether validation passed
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Check whether the report is empty
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, column: &str, row: Option<usize>, message: String) {
        self.violations.push(Violation {
            column: column.to_string(),
            row,
            message,
        });
    }

    /// Turn the report into an error when violations exist
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ValidationError { report: self })
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for violation in &self.violations {
            writeln!(f, "{}", violation)?;
        }
        Ok(())
    }
}

/// Error carrying a failed validation report
#[derive(Debug, Error)]
#[error("validation failed with {} violation(s)", .report.len())]
pub struct ValidationError {
    pub report: ValidationReport,
}

/// Rule for numeric column values
#[derive(Debug, Clone, Default)]
pub struct NumericRule {
    /// Minimum allowed value (inclusive)
    pub min: Option<f64>,
    /// Maximum allowed value (inclusive)
    pub max: Option<f64>,
    /// Whether missing (NaN) values are allowed
    pub allow_missing: bool,
}

impl NumericRule {
    /// Create a rule with bounds
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            allow_missing: false,
        }
    }

    /// Allow missing values
    pub fn with_allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    /// Check a single value, returning a message on failure
    pub fn check(&self, x: f64) -> Option<String> {
        if x.is_nan() {
            if self.allow_missing {
                return None;
            }
            return Some("Value cannot be missing".to_string());
        }
        if let Some(min) = self.min {
            if x < min {
                return Some(format!("Value {} is less than minimum {}", x, min));
            }
        }
        if let Some(max) = self.max {
            if x > max {
                return Some(format!("Value {} is greater than maximum {}", x, max));
            }
        }
        None
    }

    /// Check a column, reporting the first offending row
    pub fn check_column(&self, name: &str, column: &Column) -> Option<Violation> {
        let values = match column.as_f64() {
            Some(values) => values,
            None => {
                return Some(Violation {
                    column: name.to_string(),
                    row: None,
                    message: format!("Column must be numeric, got {}", column.dtype().as_str()),
                })
            }
        };

        for (row, &x) in values.iter().enumerate() {
            if let Some(message) = self.check(x) {
                return Some(Violation {
                    column: name.to_string(),
                    row: Some(row),
                    message,
                });
            }
        }
        None
    }
}

/// Rule for string column values
///
/// Empty strings count as missing.
#[derive(Debug, Clone, Default)]
pub struct StringRule {
    /// Minimum string length
    pub min_length: usize,
    /// Maximum string length
    pub max_length: Option<usize>,
    /// Closed set of allowed values
    pub allowed_values: Option<Vec<String>>,
    /// Whether missing (empty) values are allowed
    pub allow_missing: bool,
}

impl StringRule {
    /// Create a rule restricted to a set of allowed values
    pub fn allowed(values: Vec<String>) -> Self {
        Self {
            allowed_values: Some(values),
            ..Self::default()
        }
    }

    /// Check a single value, returning a message on failure
    pub fn check(&self, s: &str) -> Option<String> {
        if s.is_empty() {
            if self.allow_missing {
                return None;
            }
            if self.min_length == 0 && self.allowed_values.is_none() {
                return None;
            }
            return Some("Value cannot be missing".to_string());
        }
        if s.len() < self.min_length {
            return Some(format!(
                "String length {} is less than minimum {}",
                s.len(),
                self.min_length
            ));
        }
        if let Some(max) = self.max_length {
            if s.len() > max {
                return Some(format!(
                    "String length {} is greater than maximum {}",
                    s.len(),
                    max
                ));
            }
        }
        if let Some(allowed) = &self.allowed_values {
            if !allowed.iter().any(|a| a == s) {
                return Some(format!(
                    "Value '{}' not in allowed values: {:?}",
                    s, allowed
                ));
            }
        }
        None
    }

    /// Check a column, reporting the first offending row
    pub fn check_column(&self, name: &str, column: &Column) -> Option<Violation> {
        let values = match column {
            Column::Str(values) => values,
            other => {
                return Some(Violation {
                    column: name.to_string(),
                    row: None,
                    message: format!("Column must be string, got {}", other.dtype().as_str()),
                })
            }
        };

        for (row, s) in values.iter().enumerate() {
            if let Some(message) = self.check(s) {
                return Some(Violation {
                    column: name.to_string(),
                    row: Some(row),
                    message,
                });
            }
        }
        None
    }
}

/// A per-column rule
#[derive(Debug, Clone)]
pub enum ColumnRule {
    Numeric(NumericRule),
    String(StringRule),
}

impl ColumnRule {
    fn check_column(&self, name: &str, column: &Column) -> Option<Violation> {
        match self {
            ColumnRule::Numeric(rule) => rule.check_column(name, column),
            ColumnRule::String(rule) => rule.check_column(name, column),
        }
    }
}

/// Rule set for an input frame
///
/// Required columns must be present; column rules apply only to the
/// columns that are.
#[derive(Debug, Clone, Default)]
pub struct FrameRule {
    pub required_columns: Vec<String>,
    pub rules: Vec<(String, ColumnRule)>,
}

impl FrameRule {
    /// Create a rule requiring the given columns
    pub fn require(columns: &[&str]) -> Self {
        Self {
            required_columns: columns.iter().map(|c| c.to_string()).collect(),
            rules: Vec::new(),
        }
    }

    /// Attach a rule to a column
    pub fn with_rule(mut self, column: impl Into<String>, rule: ColumnRule) -> Self {
        self.rules.push((column.into(), rule));
        self
    }

    /// Validate a frame
    pub fn validate(&self, frame: &Frame) -> ValidationReport {
        let mut report = ValidationReport::default();

        for required in &self.required_columns {
            if !frame.contains_column(required) {
                report.push(
                    required,
                    None,
                    format!("Required column '{}' missing", required),
                );
            }
        }

        for (name, rule) in &self.rules {
            if let Some(column) = frame.column(name) {
                if let Some(violation) = rule.check_column(name, column) {
                    report.violations.push(violation);
                }
            }
        }

        report
    }
}

/// Validates computed feature output against spec checks
#[derive(Debug, Clone, Default)]
pub struct FeatureValidator;

impl FeatureValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate computed features against their spec checks
    ///
    /// `frame` is the output of `batch_calculate` for `set`. Features
    /// without a `checks` block are skipped.
    pub fn validate(&self, frame: &Frame, set: &FeatureSet) -> ValidationReport {
        let mut report = ValidationReport::default();

        for spec in &set.features {
            let checks = match &spec.checks {
                Some(checks) => checks,
                None => continue,
            };

            let column = match frame.column(&spec.name) {
                Some(column) => column,
                None => {
                    report.push(
                        &spec.name,
                        None,
                        format!("Feature column '{}' missing from output", spec.name),
                    );
                    continue;
                }
            };

            let values = match column.as_f64() {
                Some(values) => values,
                None => {
                    report.push(
                        &spec.name,
                        None,
                        format!(
                            "Feature column must be numeric, got {}",
                            column.dtype().as_str()
                        ),
                    );
                    continue;
                }
            };

            if let Some(max_ratio) = checks.max_missing_ratio {
                let missing = values.iter().filter(|x| !x.is_finite()).count();
                let ratio = if values.is_empty() {
                    0.0
                } else {
                    missing as f64 / values.len() as f64
                };
                if ratio > max_ratio {
                    report.push(
                        &spec.name,
                        None,
                        format!(
                            "Missing ratio {:.4} is greater than maximum {:.4}",
                            ratio, max_ratio
                        ),
                    );
                }
            }

            let rule = NumericRule {
                min: checks.min,
                max: checks.max,
                allow_missing: checks.allow_nan,
            };
            if let Some(violation) = rule.check_column(&spec.name, column) {
                report.violations.push(violation);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FeatureChecks, FeatureSpec, FeatureSet};

    fn frame_with(name: &str, column: Column) -> Frame {
        let mut frame = Frame::new();
        frame.push_column(name, column).unwrap();
        frame
    }

    #[test]
    fn test_numeric_rule_bounds() {
        let rule = NumericRule::range(Some(0.0), Some(10.0));
        assert!(rule.check(5.0).is_none());
        assert_eq!(
            rule.check(-1.0).unwrap(),
            "Value -1 is less than minimum 0"
        );
        assert_eq!(
            rule.check(11.0).unwrap(),
            "Value 11 is greater than maximum 10"
        );
    }

    #[test]
    fn test_numeric_rule_missing() {
        let strict = NumericRule::range(None, None);
        assert!(strict.check(f64::NAN).is_some());

        let lenient = NumericRule::range(None, None).with_allow_missing(true);
        assert!(lenient.check(f64::NAN).is_none());
    }

    #[test]
    fn test_numeric_rule_reports_first_offending_row() {
        let rule = NumericRule::range(Some(0.0), None);
        let column = Column::Float64(vec![1.0, -2.0, -3.0]);
        let violation = rule.check_column("x", &column).unwrap();
        assert_eq!(violation.row, Some(1));
    }

    #[test]
    fn test_numeric_rule_rejects_string_column() {
        let rule = NumericRule::default();
        let column = Column::Str(vec!["a".to_string()]);
        let violation = rule.check_column("x", &column).unwrap();
        assert!(violation.message.contains("must be numeric"));
    }

    #[test]
    fn test_string_rule_allowed_values() {
        let rule = StringRule::allowed(vec!["red".to_string(), "blue".to_string()]);
        assert!(rule.check("red").is_none());
        assert!(rule.check("green").unwrap().contains("not in allowed values"));
    }

    #[test]
    fn test_string_rule_lengths() {
        let rule = StringRule {
            min_length: 2,
            max_length: Some(4),
            ..StringRule::default()
        };
        assert!(rule.check("ab").is_none());
        assert!(rule.check("a").unwrap().contains("less than minimum"));
        assert!(rule.check("abcde").unwrap().contains("greater than maximum"));
    }

    #[test]
    fn test_frame_rule_required_columns() {
        let rule = FrameRule::require(&["mass", "count"]);
        let frame = frame_with("mass", Column::Float64(vec![1.0]));

        let report = rule.validate(&frame);
        assert_eq!(report.len(), 1);
        assert!(report.violations[0].message.contains("count"));
    }

    #[test]
    fn test_frame_rule_column_rules() {
        let rule = FrameRule::require(&["mass"]).with_rule(
            "mass",
            ColumnRule::Numeric(NumericRule::range(Some(0.0), None)),
        );
        let frame = frame_with("mass", Column::Float64(vec![1.0, -1.0]));

        let report = rule.validate(&frame);
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations[0].row, Some(1));
    }

    #[test]
    fn test_feature_validator_checks() {
        let spec = FeatureSpec::expression("f", "x").with_checks(FeatureChecks {
            min: Some(0.0),
            max: Some(1.0),
            allow_nan: false,
            max_missing_ratio: None,
        });
        let set = FeatureSet::new(vec![spec]);

        let good = frame_with("f", Column::Float64(vec![0.1, 0.9]));
        assert!(FeatureValidator::new().validate(&good, &set).is_ok());

        let bad = frame_with("f", Column::Float64(vec![0.1, 1.5]));
        let report = FeatureValidator::new().validate(&bad, &set);
        assert_eq!(report.len(), 1);
        assert!(report.violations[0].message.contains("greater than maximum"));
    }

    #[test]
    fn test_feature_validator_missing_ratio() {
        let spec = FeatureSpec::expression("f", "x").with_checks(FeatureChecks {
            max_missing_ratio: Some(0.25),
            ..FeatureChecks::default()
        });
        let set = FeatureSet::new(vec![spec]);

        let frame = frame_with("f", Column::Float64(vec![1.0, f64::NAN, f64::NAN, 2.0]));
        let report = FeatureValidator::new().validate(&frame, &set);
        assert_eq!(report.len(), 1);
        assert!(report.violations[0].message.contains("Missing ratio"));
    }

    #[test]
    fn test_feature_validator_missing_column() {
        let spec = FeatureSpec::expression("f", "x").with_checks(FeatureChecks::default());
        let set = FeatureSet::new(vec![spec]);

        let frame = frame_with("other", Column::Float64(vec![1.0]));
        let report = FeatureValidator::new().validate(&frame, &set);
        assert_eq!(report.len(), 1);
        assert!(report.violations[0].message.contains("missing from output"));
    }

    #[test]
    fn test_report_into_result() {
        let report = ValidationReport::default();
        assert!(report.into_result().is_ok());

        let mut failing = ValidationReport::default();
        failing.push("x", Some(3), "bad".to_string());
        let err = failing.into_result().unwrap_err();
        assert_eq!(err.report.len(), 1);
        assert!(err.to_string().contains("1 violation"));
    }
}
