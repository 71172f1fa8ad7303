//! Feature specifications
//!
//! A `FeatureSet` is the declarative input to the engine: an ordered
//! list of named features, each either an expression over columns or
//! a whole-column transform, plus an optional row filter.
//!
//! ```yaml
//! filter: "mass > 0"
//! features:
//!   - name: bmi
//!     expr: "weight / height ** 2"
//!   - name: mass_z
//!     transform: zscore
//!     source: mass
//!     checks:
//!       min: -5
//!       max: 5
//! ```

use featurecalc_expr::{parse_expression, parse_predicate, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Feature spec errors
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Failed to read spec file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse spec: {0}")]
    Format(String),

    #[error("Unsupported spec format: {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),

    #[error("Feature name cannot be empty")]
    EmptyName,

    #[error("Duplicate feature name: {0}")]
    Duplicate(String),

    #[error("Invalid expression for feature '{feature}': {source}")]
    Expression {
        feature: String,
        #[source]
        source: ParseError,
    },

    #[error("Invalid filter: {0}")]
    Filter(#[source] ParseError),

    #[error("Invalid parameters for feature '{feature}': {message}")]
    InvalidParams { feature: String, message: String },
}

/// A single feature definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Output column name
    pub name: String,

    /// How the feature is computed
    #[serde(flatten)]
    pub body: FeatureBody,

    /// Optional output checks applied by the validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<FeatureChecks>,
}

impl FeatureSpec {
    /// Create an expression feature
    pub fn expression(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: FeatureBody::Expression { expr: expr.into() },
            checks: None,
        }
    }

    /// Create a transform feature
    pub fn transform(
        name: impl Into<String>,
        transform: TransformKind,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            body: FeatureBody::Transform {
                transform,
                source: source.into(),
                params: TransformParams::default(),
            },
            checks: None,
        }
    }

    /// Attach output checks
    pub fn with_checks(mut self, checks: FeatureChecks) -> Self {
        self.checks = Some(checks);
        self
    }

    /// Validate the spec in isolation (no data required)
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }

        match &self.body {
            FeatureBody::Expression { expr } => {
                parse_expression(expr).map_err(|source| SpecError::Expression {
                    feature: self.name.clone(),
                    source,
                })?;
            }
            FeatureBody::Transform {
                transform, params, ..
            } => {
                validate_params(&self.name, *transform, params)?;
            }
        }
        Ok(())
    }
}

/// How a feature is computed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureBody {
    /// An arithmetic expression over input columns
    Expression { expr: String },

    /// A whole-column transform of one source column
    Transform {
        transform: TransformKind,
        source: String,
        #[serde(default)]
        params: TransformParams,
    },
}

/// Available column transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[serde(rename = "zscore")]
    ZScore,
    #[serde(rename = "robust_zscore")]
    RobustZScore,
    MinMax,
    Log,
    Log10,
    Sqrt,
    Abs,
    Winsorize,
    Clip,
    FillMissing,
}

impl TransformKind {
    /// Get the spec-file name of the transform
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::ZScore => "zscore",
            TransformKind::RobustZScore => "robust_zscore",
            TransformKind::MinMax => "min_max",
            TransformKind::Log => "log",
            TransformKind::Log10 => "log10",
            TransformKind::Sqrt => "sqrt",
            TransformKind::Abs => "abs",
            TransformKind::Winsorize => "winsorize",
            TransformKind::Clip => "clip",
            TransformKind::FillMissing => "fill_missing",
        }
    }
}

/// Parameters for transforms that need them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformParams {
    /// Winsorize tail percentile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct: Option<f64>,
    /// Clip lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Clip upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Fill strategy for missing values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FillStrategy>,
    /// Fill value for `strategy: value`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// How missing values are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    Mean,
    Median,
    Zero,
    Value,
}

/// Output checks for a computed feature
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureChecks {
    /// Minimum allowed value (inclusive)
    pub min: Option<f64>,
    /// Maximum allowed value (inclusive)
    pub max: Option<f64>,
    /// Whether NaN output values are allowed
    pub allow_nan: bool,
    /// Maximum tolerated fraction of missing output values
    pub max_missing_ratio: Option<f64>,
}

impl Default for FeatureChecks {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            allow_nan: true,
            max_missing_ratio: None,
        }
    }
}

/// An ordered set of features with an optional row filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Features in output order
    #[serde(default)]
    pub features: Vec<FeatureSpec>,

    /// Optional row filter applied before any calculation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Whether input columns are carried into the output
    #[serde(default = "default_keep_input")]
    pub keep_input: bool,
}

fn default_keep_input() -> bool {
    true
}

impl FeatureSet {
    /// Create an empty set
    pub fn new(features: Vec<FeatureSpec>) -> Self {
        Self {
            features,
            filter: None,
            keep_input: true,
        }
    }

    /// Set the row filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set whether input columns are kept in the output
    pub fn with_keep_input(mut self, keep: bool) -> Self {
        self.keep_input = keep;
        self
    }

    /// Parse a feature set from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        serde_yaml::from_str(yaml).map_err(|e| SpecError::Format(e.to_string()))
    }

    /// Parse a feature set from JSON
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        serde_json::from_str(json).map_err(|e| SpecError::Format(e.to_string()))
    }

    /// Load a feature set from a file, by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SpecError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            other => Err(SpecError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Validate the whole set before any data work
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut seen = HashSet::new();
        for spec in &self.features {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(SpecError::Duplicate(spec.name.clone()));
            }
        }

        if let Some(filter) = &self.filter {
            parse_predicate(filter).map_err(SpecError::Filter)?;
        }
        Ok(())
    }
}

fn validate_params(
    feature: &str,
    kind: TransformKind,
    params: &TransformParams,
) -> Result<(), SpecError> {
    match kind {
        TransformKind::Winsorize => {
            let pct = params.pct.unwrap_or(5.0);
            if !(0.0..50.0).contains(&pct) {
                return Err(SpecError::InvalidParams {
                    feature: feature.to_string(),
                    message: format!("winsorize pct {} must be in [0, 50)", pct),
                });
            }
        }
        TransformKind::Clip => {
            if params.min.is_none() && params.max.is_none() {
                return Err(SpecError::InvalidParams {
                    feature: feature.to_string(),
                    message: "clip requires min and/or max".to_string(),
                });
            }
            if let (Some(min), Some(max)) = (params.min, params.max) {
                if min > max {
                    return Err(SpecError::InvalidParams {
                        feature: feature.to_string(),
                        message: format!("clip min {} exceeds max {}", min, max),
                    });
                }
            }
        }
        TransformKind::FillMissing => {
            if params.strategy == Some(FillStrategy::Value) && params.value.is_none() {
                return Err(SpecError::InvalidParams {
                    feature: feature.to_string(),
                    message: "fill_missing with strategy 'value' requires a value".to_string(),
                });
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
filter: "mass > 0"
features:
  - name: log_mass
    expr: "log10(mass)"
  - name: mass_z
    transform: zscore
    source: mass
  - name: mass_w
    transform: winsorize
    source: mass
    params:
      pct: 10
    checks:
      min: 0
      allow_nan: false
"#;

    #[test]
    fn test_parse_yaml_set() {
        let set = FeatureSet::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(set.features.len(), 3);
        assert_eq!(set.filter.as_deref(), Some("mass > 0"));
        assert!(set.keep_input);

        assert!(matches!(
            set.features[0].body,
            FeatureBody::Expression { .. }
        ));
        match &set.features[1].body {
            FeatureBody::Transform {
                transform, source, ..
            } => {
                assert_eq!(*transform, TransformKind::ZScore);
                assert_eq!(source, "mass");
            }
            other => panic!("unexpected body: {:?}", other),
        }

        let checks = set.features[2].checks.as_ref().unwrap();
        assert_eq!(checks.min, Some(0.0));
        assert!(!checks.allow_nan);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_parse_json_set() {
        let json = r#"{"features": [{"name": "a", "expr": "x + 1"}], "keep_input": false}"#;
        let set = FeatureSet::from_json(json).unwrap();
        assert_eq!(set.features.len(), 1);
        assert!(!set.keep_input);
    }

    #[test]
    fn test_validate_duplicate_names() {
        let set = FeatureSet::new(vec![
            FeatureSpec::expression("a", "x + 1"),
            FeatureSpec::expression("a", "x + 2"),
        ]);
        assert!(matches!(set.validate(), Err(SpecError::Duplicate(_))));
    }

    #[test]
    fn test_validate_empty_name() {
        let set = FeatureSet::new(vec![FeatureSpec::expression("  ", "x")]);
        assert!(matches!(set.validate(), Err(SpecError::EmptyName)));
    }

    #[test]
    fn test_validate_bad_expression() {
        let set = FeatureSet::new(vec![FeatureSpec::expression("a", "x +")]);
        assert!(matches!(set.validate(), Err(SpecError::Expression { .. })));
    }

    #[test]
    fn test_validate_bad_filter() {
        let set = FeatureSet::new(vec![]).with_filter("mass >");
        assert!(matches!(set.validate(), Err(SpecError::Filter(_))));
    }

    #[test]
    fn test_validate_clip_without_bounds() {
        let set = FeatureSet::new(vec![FeatureSpec::transform(
            "c",
            TransformKind::Clip,
            "x",
        )]);
        assert!(matches!(set.validate(), Err(SpecError::InvalidParams { .. })));
    }

    #[test]
    fn test_validate_fill_value_requires_value() {
        let mut spec = FeatureSpec::transform("f", TransformKind::FillMissing, "x");
        if let FeatureBody::Transform { params, .. } = &mut spec.body {
            params.strategy = Some(FillStrategy::Value);
        }
        let set = FeatureSet::new(vec![spec]);
        assert!(matches!(set.validate(), Err(SpecError::InvalidParams { .. })));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.toml");
        std::fs::write(&path, "features: []").unwrap();
        assert!(matches!(
            FeatureSet::load(&path),
            Err(SpecError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.yaml");
        std::fs::write(&path, SAMPLE_YAML).unwrap();
        let set = FeatureSet::load(&path).unwrap();
        assert_eq!(set.features.len(), 3);
    }

    #[test]
    fn test_spec_roundtrip_through_json() {
        let spec = FeatureSpec::transform("z", TransformKind::RobustZScore, "mass");
        let json = serde_json::to_string(&spec).unwrap();
        let back: FeatureSpec = serde_json::from_str(&json).unwrap();
        match back.body {
            FeatureBody::Transform { transform, .. } => {
                assert_eq!(transform, TransformKind::RobustZScore)
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
