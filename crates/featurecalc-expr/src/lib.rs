//! featurecalc-expr - Feature expression language
//!
//! A small expression language over named columns, used for both
//! derived features and row filters:
//!
//! ```text
//! bmi    = weight / height ** 2
//! filter = mass > 0 && zscore(mass) < 3
//! ```
//!
//! The grammar supports arithmetic (`+ - * / % **`), comparisons,
//! boolean connectives (`&& || !`), and a fixed function table
//! including the statistics-backed `zscore`/`robust_zscore`.

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::{BinOp, CmpOp, Expr, FunctionCall, Predicate};
pub use eval::{
    predicate_stat_columns, stat_columns, EvalContext, EvalError, EvalResult, Evaluator,
};
pub use parser::{parse_expression, parse_predicate, ParseError};
