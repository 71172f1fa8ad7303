//! Abstract Syntax Tree for feature expressions
//!
//! Two expression families share one value grammar: `Expr` computes
//! a number per row (a feature), `Predicate` computes a boolean per
//! row (a filter).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An arithmetic expression over columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A numeric literal
    Number(f64),

    /// A column reference
    Column(String),

    /// Arithmetic negation
    Neg(Box<Expr>),

    /// A binary arithmetic operation
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// A function call
    Call(FunctionCall),
}

impl Expr {
    /// Create a binary operation
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Create a negation
    pub fn neg(inner: Expr) -> Self {
        Expr::Neg(Box::new(inner))
    }

    /// Create a column reference
    pub fn column(name: &str) -> Self {
        Expr::Column(name.to_string())
    }

    /// Collect every column name referenced by the expression
    pub fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    arg.collect_columns(out);
                }
            }
        }
    }
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/), IEEE semantics on zero denominators
    Div,
    /// Remainder (%)
    Mod,
    /// Exponentiation (**)
    Pow,
}

impl BinOp {
    /// Apply the operator to two values
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
            BinOp::Mod => lhs % rhs,
            BinOp::Pow => lhs.powf(rhs),
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

/// A function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// Arguments
    pub args: Vec<Expr>,
}

impl FunctionCall {
    /// Create a new function call
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// A row filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Logical AND of two predicates
    And(Box<Predicate>, Box<Predicate>),

    /// Logical OR of two predicates
    Or(Box<Predicate>, Box<Predicate>),

    /// Logical NOT of a predicate
    Not(Box<Predicate>),

    /// A comparison between two expressions
    Comparison {
        lhs: Expr,
        op: CmpOp,
        rhs: Expr,
    },

    /// All rows (constant true)
    All,

    /// No rows (constant false)
    None,
}

impl Predicate {
    /// Create an AND predicate
    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(Box::new(left), Box::new(right))
    }

    /// Create an OR predicate
    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    /// Create a NOT predicate
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Create a comparison predicate
    pub fn comparison(lhs: Expr, op: CmpOp, rhs: Expr) -> Self {
        Predicate::Comparison { lhs, op, rhs }
    }

    /// Collect every column name referenced by the predicate
    pub fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Predicate::Not(inner) => inner.collect_columns(out),
            Predicate::Comparison { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Predicate::All | Predicate::None => {}
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
}

impl CmpOp {
    /// Evaluate the comparison for two f64 values
    pub fn evaluate(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => (lhs - rhs).abs() < 1e-10,
            CmpOp::Ne => (lhs - rhs).abs() >= 1e-10,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binop_apply() {
        assert_eq!(BinOp::Add.apply(2.0, 3.0), 5.0);
        assert_eq!(BinOp::Pow.apply(2.0, 3.0), 8.0);
        assert_eq!(BinOp::Mod.apply(10.0, 3.0), 1.0);
        assert!(BinOp::Div.apply(1.0, 0.0).is_infinite());
        assert!(BinOp::Mod.apply(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_cmp_evaluate() {
        assert!(CmpOp::Lt.evaluate(1.0, 2.0));
        assert!(!CmpOp::Lt.evaluate(2.0, 1.0));
        assert!(CmpOp::Le.evaluate(1.0, 1.0));
        assert!(CmpOp::Eq.evaluate(1.0, 1.0 + 1e-12));
        assert!(CmpOp::Ne.evaluate(1.0, 1.1));
    }

    #[test]
    fn test_collect_columns() {
        let expr = Expr::binary(
            BinOp::Div,
            Expr::column("weight"),
            Expr::binary(BinOp::Mul, Expr::column("height"), Expr::column("height")),
        );

        let mut columns = BTreeSet::new();
        expr.collect_columns(&mut columns);
        assert_eq!(
            columns.into_iter().collect::<Vec<_>>(),
            vec!["height".to_string(), "weight".to_string()]
        );
    }
}
