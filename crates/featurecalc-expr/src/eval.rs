//! Expression evaluation against columnar data
//!
//! Evaluation is row-wise: the engine hands out row ranges so chunks
//! can run on separate worker threads. Statistics-backed functions
//! (`zscore`, `robust_zscore`) read precomputed column summaries from
//! the context, so a chunked evaluation gives the same result as a
//! whole-column one.

use crate::ast::{Expr, FunctionCall, Predicate};
use featurecalc_stats::Summary;
use std::collections::BTreeSet;
use thiserror::Error;

/// Evaluation errors
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("No statistics available for column: {0}")]
    MissingStats(String),
}

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Context for evaluation - provides column values and statistics
pub trait EvalContext: Sync {
    /// Get the value of a column at a row index
    fn column_value(&self, column: &str, row: usize) -> Option<f64>;

    /// Get the number of rows
    fn num_rows(&self) -> usize;

    /// Get precomputed statistics for a column
    fn column_stats(&self, column: &str) -> Option<&Summary>;
}

/// Evaluator for feature expressions
pub struct Evaluator<'a, C: EvalContext> {
    context: &'a C,
}

impl<'a, C: EvalContext> Evaluator<'a, C> {
    /// Create a new evaluator
    pub fn new(context: &'a C) -> Self {
        Self { context }
    }

    /// Evaluate an expression over every row
    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Vec<f64>> {
        self.evaluate_range(expr, 0, self.context.num_rows())
    }

    /// Evaluate an expression over a row range
    pub fn evaluate_range(&self, expr: &Expr, start: usize, end: usize) -> EvalResult<Vec<f64>> {
        let mut result = Vec::with_capacity(end.saturating_sub(start));
        for row in start..end {
            result.push(self.evaluate_at(expr, row)?);
        }
        Ok(result)
    }

    /// Evaluate an expression at a single row
    pub fn evaluate_at(&self, expr: &Expr, row: usize) -> EvalResult<f64> {
        match expr {
            Expr::Number(n) => Ok(*n),

            Expr::Column(name) => self
                .context
                .column_value(name, row)
                .ok_or_else(|| EvalError::ColumnNotFound(name.clone())),

            Expr::Neg(inner) => Ok(-self.evaluate_at(inner, row)?),

            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate_at(lhs, row)?;
                let rhs = self.evaluate_at(rhs, row)?;
                Ok(op.apply(lhs, rhs))
            }

            Expr::Call(call) => self.evaluate_function(call, row),
        }
    }

    /// Evaluate a predicate over every row
    pub fn evaluate_predicate(&self, pred: &Predicate) -> EvalResult<Vec<bool>> {
        self.evaluate_predicate_range(pred, 0, self.context.num_rows())
    }

    /// Evaluate a predicate over a row range
    pub fn evaluate_predicate_range(
        &self,
        pred: &Predicate,
        start: usize,
        end: usize,
    ) -> EvalResult<Vec<bool>> {
        let mut result = Vec::with_capacity(end.saturating_sub(start));
        for row in start..end {
            result.push(self.evaluate_predicate_at(pred, row)?);
        }
        Ok(result)
    }

    /// Evaluate a predicate at a single row
    pub fn evaluate_predicate_at(&self, pred: &Predicate, row: usize) -> EvalResult<bool> {
        match pred {
            Predicate::All => Ok(true),
            Predicate::None => Ok(false),

            Predicate::And(left, right) => Ok(self.evaluate_predicate_at(left, row)?
                && self.evaluate_predicate_at(right, row)?),

            Predicate::Or(left, right) => Ok(self.evaluate_predicate_at(left, row)?
                || self.evaluate_predicate_at(right, row)?),

            Predicate::Not(inner) => Ok(!self.evaluate_predicate_at(inner, row)?),

            Predicate::Comparison { lhs, op, rhs } => {
                let lhs = self.evaluate_at(lhs, row)?;
                let rhs = self.evaluate_at(rhs, row)?;
                Ok(op.evaluate(lhs, rhs))
            }
        }
    }

    fn evaluate_function(&self, call: &FunctionCall, row: usize) -> EvalResult<f64> {
        match call.name.as_str() {
            "abs" => Ok(self.single_arg(call, row)?.abs()),
            "sqrt" => Ok(self.single_arg(call, row)?.sqrt()),
            "log" => Ok(self.single_arg(call, row)?.ln()),
            "log10" => Ok(self.single_arg(call, row)?.log10()),
            "exp" => Ok(self.single_arg(call, row)?.exp()),
            "floor" => Ok(self.single_arg(call, row)?.floor()),
            "ceil" => Ok(self.single_arg(call, row)?.ceil()),

            "min" => {
                let (a, b) = self.two_args(call, row)?;
                Ok(a.min(b))
            }
            "max" => {
                let (a, b) = self.two_args(call, row)?;
                Ok(a.max(b))
            }

            "clamp" => {
                if call.args.len() != 3 {
                    return Err(EvalError::InvalidArguments(
                        "clamp requires (value, low, high) arguments".to_string(),
                    ));
                }
                let x = self.evaluate_at(&call.args[0], row)?;
                let low = self.evaluate_at(&call.args[1], row)?;
                let high = self.evaluate_at(&call.args[2], row)?;
                Ok(x.clamp(low, high))
            }

            "safe_div" => {
                let (num, den) = self.two_args(call, row)?;
                if den == 0.0 {
                    Ok(0.0)
                } else {
                    Ok(num / den)
                }
            }

            "zscore" => {
                let (value, stats) = self.stat_arg(call, row)?;
                Ok(stats.zscore(value))
            }

            "robust_zscore" => {
                let (value, stats) = self.stat_arg(call, row)?;
                Ok(stats.robust_zscore(value))
            }

            _ => Err(EvalError::UnknownFunction(call.name.clone())),
        }
    }

    fn single_arg(&self, call: &FunctionCall, row: usize) -> EvalResult<f64> {
        match call.args.as_slice() {
            [arg] => self.evaluate_at(arg, row),
            _ => Err(EvalError::InvalidArguments(format!(
                "{} requires exactly one argument",
                call.name
            ))),
        }
    }

    fn two_args(&self, call: &FunctionCall, row: usize) -> EvalResult<(f64, f64)> {
        match call.args.as_slice() {
            [a, b] => Ok((self.evaluate_at(a, row)?, self.evaluate_at(b, row)?)),
            _ => Err(EvalError::InvalidArguments(format!(
                "{} requires exactly two arguments",
                call.name
            ))),
        }
    }

    fn stat_arg(&self, call: &FunctionCall, row: usize) -> EvalResult<(f64, &Summary)> {
        let column = match call.args.as_slice() {
            [Expr::Column(name)] => name,
            _ => {
                return Err(EvalError::InvalidArguments(format!(
                    "{} requires a single column argument",
                    call.name
                )))
            }
        };

        let value = self
            .context
            .column_value(column, row)
            .ok_or_else(|| EvalError::ColumnNotFound(column.clone()))?;
        let stats = self
            .context
            .column_stats(column)
            .ok_or_else(|| EvalError::MissingStats(column.clone()))?;
        Ok((value, stats))
    }
}

/// Names of functions whose evaluation needs column statistics
const STAT_FUNCTIONS: &[&str] = &["zscore", "robust_zscore"];

/// Collect the columns an expression needs statistics for
pub fn stat_columns(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Number(_) | Expr::Column(_) => {}
        Expr::Neg(inner) => stat_columns(inner, out),
        Expr::Binary { lhs, rhs, .. } => {
            stat_columns(lhs, out);
            stat_columns(rhs, out);
        }
        Expr::Call(call) => {
            if STAT_FUNCTIONS.contains(&call.name.as_str()) {
                if let [Expr::Column(name)] = call.args.as_slice() {
                    out.insert(name.clone());
                }
            }
            for arg in &call.args {
                stat_columns(arg, out);
            }
        }
    }
}

/// Collect the columns a predicate needs statistics for
pub fn predicate_stat_columns(pred: &Predicate, out: &mut BTreeSet<String>) {
    match pred {
        Predicate::And(l, r) | Predicate::Or(l, r) => {
            predicate_stat_columns(l, out);
            predicate_stat_columns(r, out);
        }
        Predicate::Not(inner) => predicate_stat_columns(inner, out),
        Predicate::Comparison { lhs, rhs, .. } => {
            stat_columns(lhs, out);
            stat_columns(rhs, out);
        }
        Predicate::All | Predicate::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_predicate};
    use std::collections::HashMap;

    struct TestContext {
        columns: HashMap<String, Vec<f64>>,
        stats: HashMap<String, Summary>,
    }

    impl TestContext {
        fn new(columns: &[(&str, Vec<f64>)]) -> Self {
            let stats = columns
                .iter()
                .map(|(name, values)| (name.to_string(), Summary::from_values(values)))
                .collect();
            let columns = columns
                .iter()
                .map(|(name, values)| (name.to_string(), values.clone()))
                .collect();
            Self { columns, stats }
        }
    }

    impl EvalContext for TestContext {
        fn column_value(&self, column: &str, row: usize) -> Option<f64> {
            self.columns.get(column).and_then(|v| v.get(row)).copied()
        }

        fn num_rows(&self) -> usize {
            self.columns.values().next().map_or(0, |v| v.len())
        }

        fn column_stats(&self, column: &str) -> Option<&Summary> {
            self.stats.get(column)
        }
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let ctx = TestContext::new(&[("x", vec![1.0, 2.0, 3.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("x * 2 + 1").unwrap();
        assert_eq!(eval.evaluate(&expr).unwrap(), vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_evaluate_pow_and_mod() {
        let ctx = TestContext::new(&[("x", vec![2.0, 3.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("x ** 2 % 5").unwrap();
        assert_eq!(eval.evaluate(&expr).unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn test_evaluate_division_by_zero_is_ieee() {
        let ctx = TestContext::new(&[("x", vec![1.0, 0.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("1 / x").unwrap();
        let result = eval.evaluate(&expr).unwrap();
        assert_eq!(result[0], 1.0);
        assert!(result[1].is_infinite());
    }

    #[test]
    fn test_evaluate_safe_div() {
        let ctx = TestContext::new(&[("num", vec![10.0, 5.0]), ("den", vec![2.0, 0.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("safe_div(num, den)").unwrap();
        assert_eq!(eval.evaluate(&expr).unwrap(), vec![5.0, 0.0]);
    }

    #[test]
    fn test_evaluate_functions() {
        let ctx = TestContext::new(&[("x", vec![100.0, -4.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("log10(abs(x))").unwrap();
        let result = eval.evaluate(&expr).unwrap();
        assert!((result[0] - 2.0).abs() < 1e-10);
        assert!((result[1] - 0.602059991).abs() < 1e-6);
    }

    #[test]
    fn test_evaluate_zscore_uses_stats() {
        let ctx = TestContext::new(&[("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("zscore(x)").unwrap();
        let result = eval.evaluate(&expr).unwrap();
        assert!(result[2].abs() < 1e-10);
        assert!(result[4] > 0.0);
    }

    #[test]
    fn test_evaluate_chunked_matches_full() {
        let ctx = TestContext::new(&[("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("zscore(x) + 1").unwrap();
        let full = eval.evaluate(&expr).unwrap();
        let mut chunked = eval.evaluate_range(&expr, 0, 2).unwrap();
        chunked.extend(eval.evaluate_range(&expr, 2, 5).unwrap());
        assert_eq!(full, chunked);
    }

    #[test]
    fn test_evaluate_unknown_column() {
        let ctx = TestContext::new(&[("x", vec![1.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("y + 1").unwrap();
        assert!(matches!(
            eval.evaluate(&expr),
            Err(EvalError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_evaluate_unknown_function() {
        let ctx = TestContext::new(&[("x", vec![1.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("median(x)").unwrap();
        assert!(matches!(
            eval.evaluate(&expr),
            Err(EvalError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_evaluate_wrong_arity() {
        let ctx = TestContext::new(&[("x", vec![1.0])]);
        let eval = Evaluator::new(&ctx);

        let expr = parse_expression("sqrt(x, 2)").unwrap();
        assert!(matches!(
            eval.evaluate(&expr),
            Err(EvalError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_evaluate_predicate_mask() {
        let ctx = TestContext::new(&[("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]);
        let eval = Evaluator::new(&ctx);

        let pred = parse_predicate("x > 2 && x != 4").unwrap();
        assert_eq!(
            eval.evaluate_predicate(&pred).unwrap(),
            vec![false, false, true, false, true]
        );
    }

    #[test]
    fn test_stat_columns_collection() {
        let expr = parse_expression("zscore(mass) + robust_zscore(count) + abs(height)").unwrap();
        let mut out = BTreeSet::new();
        stat_columns(&expr, &mut out);
        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            vec!["count".to_string(), "mass".to_string()]
        );
    }
}
