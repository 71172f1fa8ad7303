//! Feature expression parser using nom
//!
//! Grammar:
//! ```text
//! predicate  := and_pred ('||' and_pred)*
//! and_pred   := not_pred ('&&' not_pred)*
//! not_pred   := '!' pred_atom | pred_atom
//! pred_atom  := 'all' | 'none' | comparison | '(' predicate ')'
//! comparison := expr op expr
//! op         := '<' | '<=' | '>' | '>=' | '==' | '!='
//! expr       := mul_expr (('+' | '-') mul_expr)*
//! mul_expr   := unary (('*' | '/' | '%') unary)*
//! unary      := '-' unary | pow_expr
//! pow_expr   := atom ('**' unary)?          (right-associative)
//! atom       := function | column | number | '(' expr ')'
//! function   := ident '(' args ')'
//! ```

use crate::ast::*;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, not, opt, recognize, value, verify},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

/// Parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty expression")]
    Empty,

    #[error("Unexpected characters at end: '{0}'")]
    Trailing(String),
}

/// Parse a feature expression from a string
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    match expression(input) {
        Ok(("", result)) => Ok(result),
        Ok((remaining, _)) => Err(ParseError::Trailing(remaining.to_string())),
        Err(e) => Err(ParseError::Parse(format!("{:?}", e))),
    }
}

/// Parse a row filter predicate from a string
///
/// Empty input selects all rows.
pub fn parse_predicate(input: &str) -> Result<Predicate, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Predicate::All);
    }

    match predicate(input) {
        Ok(("", result)) => Ok(result),
        Ok((remaining, _)) => Err(ParseError::Trailing(remaining.to_string())),
        Err(e) => Err(ParseError::Parse(format!("{:?}", e))),
    }
}

/// Wrap a parser in optional whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parse a predicate (entry point)
fn predicate(input: &str) -> IResult<&str, Predicate> {
    let (input, first) = and_pred(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), and_pred))(input)?;

    let result = rest.into_iter().fold(first, Predicate::or);
    Ok((input, result))
}

/// Parse AND predicates
fn and_pred(input: &str) -> IResult<&str, Predicate> {
    let (input, first) = not_pred(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), not_pred))(input)?;

    let result = rest.into_iter().fold(first, Predicate::and);
    Ok((input, result))
}

/// Parse NOT predicates
fn not_pred(input: &str) -> IResult<&str, Predicate> {
    alt((
        map(preceded(ws(char('!')), pred_atom), Predicate::not),
        pred_atom,
    ))(input)
}

/// Parse atomic predicates
fn pred_atom(input: &str) -> IResult<&str, Predicate> {
    ws(alt((
        value(Predicate::All, verify(identifier, |s: &str| s == "all")),
        value(Predicate::None, verify(identifier, |s: &str| s == "none")),
        map(comparison, |(lhs, op, rhs)| {
            Predicate::comparison(lhs, op, rhs)
        }),
        delimited(char('('), predicate, char(')')),
    )))(input)
}

/// Parse a comparison
fn comparison(input: &str) -> IResult<&str, (Expr, CmpOp, Expr)> {
    let (input, lhs) = expression(input)?;
    let (input, op) = ws(cmp_op)(input)?;
    let (input, rhs) = expression(input)?;
    Ok((input, (lhs, op, rhs)))
}

/// Parse a comparison operator
fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    alt((
        value(CmpOp::Le, tag("<=")),
        value(CmpOp::Ge, tag(">=")),
        value(CmpOp::Eq, tag("==")),
        value(CmpOp::Ne, tag("!=")),
        value(CmpOp::Lt, tag("<")),
        value(CmpOp::Gt, tag(">")),
    ))(input)
}

/// Parse an arithmetic expression (entry point)
fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, first) = mul_expr(input)?;
    let (input, rest) = many0(pair(ws(add_op), mul_expr))(input)?;

    let result = rest
        .into_iter()
        .fold(first, |acc, (op, rhs)| Expr::binary(op, acc, rhs));
    Ok((input, result))
}

fn add_op(input: &str) -> IResult<&str, BinOp> {
    alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-'))))(input)
}

/// Parse multiplication-level expressions
fn mul_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(ws(mul_op), unary))(input)?;

    let result = rest
        .into_iter()
        .fold(first, |acc, (op, rhs)| Expr::binary(op, acc, rhs));
    Ok((input, result))
}

fn mul_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        // A single '*': "**" belongs to the power level
        value(BinOp::Mul, terminated(char('*'), not(char('*')))),
        value(BinOp::Div, char('/')),
        value(BinOp::Mod, char('%')),
    ))(input)
}

/// Parse unary minus
fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), Expr::neg),
        pow_expr,
    ))(input)
}

/// Parse exponentiation (right-associative, binds tighter than unary minus)
fn pow_expr(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(tag("**")), unary))(input)?;

    Ok(match exponent {
        Some(exp) => (input, Expr::binary(BinOp::Pow, base, exp)),
        None => (input, base),
    })
}

/// Parse atomic expressions
fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(function_call, Expr::Call),
        map(identifier, |s| Expr::Column(s.to_string())),
        map(double, Expr::Number),
        delimited(char('('), expression, char(')')),
    )))(input)
}

/// Parse an identifier (letter or underscore, then alphanumeric or underscore)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, FunctionCall> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = delimited(
        char('('),
        separated_list0(ws(char(',')), expression),
        char(')'),
    )(input)?;

    Ok((input, FunctionCall::new(name, args)))
}
