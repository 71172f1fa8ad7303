//! Interactive arithmetic calculator
//!
//! A small `calc>` loop for one-off arithmetic: `number operator
//! number` per line, with `help`, `last` and `quit` commands. The
//! previous result is kept for recall via `last`.

use anyhow::Result;
use rustyline::{error::ReadlineError, DefaultEditor};

const HELP: &str = "
Supported Operations:
  +   : Addition
  -   : Subtraction
  *   : Multiplication
  /   : Division
  **  : Exponentiation
  %   : Modulo (remainder)

Usage:
  Enter calculations in the format: number operator number
  Examples:
    5 + 3
    10 - 2
    2 ** 3
    10 % 3

Commands:
  help  : Display this help message
  last  : Show the last calculation result
  quit  : Exit the calculator
";

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Input {
    pub lhs: f64,
    pub operator: Operator,
    pub rhs: f64,
}

/// Supported binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
}

impl Operator {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            "**" => Some(Operator::Pow),
            "%" => Some(Operator::Mod),
            _ => None,
        }
    }
}

/// The calculator state: just the last result
#[derive(Debug, Default)]
pub struct Calculator {
    last_result: Option<f64>,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `number operator number` line
    pub fn parse_input(line: &str) -> Result<Input, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err("Invalid input format. Use: number operator number".to_string());
        }

        let lhs: f64 = parts[0]
            .parse()
            .map_err(|_| format!("Invalid input: '{}' is not a number", parts[0]))?;
        let rhs: f64 = parts[2]
            .parse()
            .map_err(|_| format!("Invalid input: '{}' is not a number", parts[2]))?;
        let operator = Operator::parse(parts[1])
            .ok_or_else(|| format!("Unsupported operator: {}", parts[1]))?;

        Ok(Input { lhs, operator, rhs })
    }

    /// Perform a calculation and remember the result
    pub fn calculate(&mut self, input: Input) -> Result<f64, String> {
        let Input { lhs, operator, rhs } = input;
        let result = match operator {
            Operator::Add => lhs + rhs,
            Operator::Sub => lhs - rhs,
            Operator::Mul => lhs * rhs,
            Operator::Div => {
                if rhs == 0.0 {
                    return Err("Cannot divide by zero".to_string());
                }
                lhs / rhs
            }
            Operator::Pow => lhs.powf(rhs),
            Operator::Mod => {
                if rhs == 0.0 {
                    return Err("Cannot perform modulo with zero".to_string());
                }
                lhs % rhs
            }
        };
        self.last_result = Some(result);
        Ok(result)
    }

    /// Get the last calculation result
    pub fn last_result(&self) -> Option<f64> {
        self.last_result
    }
}

/// Run the interactive loop
pub fn run() -> Result<()> {
    let mut calculator = Calculator::new();
    let mut rl = DefaultEditor::new()?;

    println!();
    println!("{}", "=".repeat(60));
    println!("Welcome to Feature Calculator!");
    println!("Type 'help' for usage information or 'quit' to exit.");
    println!("{}", "=".repeat(60));
    println!();

    loop {
        match rl.readline("calc> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                match trimmed.to_lowercase().as_str() {
                    "quit" => {
                        println!("\nThank you for using Feature Calculator. Goodbye!");
                        return Ok(());
                    }
                    "help" => {
                        println!("{}", HELP);
                        continue;
                    }
                    "last" => {
                        match calculator.last_result() {
                            Some(result) => println!("Last result: {}", result),
                            None => println!("No previous calculation result available."),
                        }
                        continue;
                    }
                    _ => {}
                }

                match Calculator::parse_input(trimmed)
                    .and_then(|input| calculator.calculate(input))
                {
                    Ok(result) => println!("Result: {}", result),
                    Err(message) => println!("Error: {}", message),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nCalculator interrupted. Goodbye!");
                return Ok(());
            }
            Err(err) => {
                println!("Unexpected error: {}", err);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        let input = Calculator::parse_input("5 + 3").unwrap();
        assert_eq!(input.lhs, 5.0);
        assert_eq!(input.operator, Operator::Add);
        assert_eq!(input.rhs, 3.0);

        let input = Calculator::parse_input("  2 ** 10 ").unwrap();
        assert_eq!(input.operator, Operator::Pow);
    }

    #[test]
    fn test_parse_input_rejects_short_lines() {
        let err = Calculator::parse_input("5 +").unwrap_err();
        assert_eq!(err, "Invalid input format. Use: number operator number");
    }

    #[test]
    fn test_parse_input_rejects_bad_numbers() {
        let err = Calculator::parse_input("five + 3").unwrap_err();
        assert!(err.contains("not a number"));
    }

    #[test]
    fn test_parse_input_rejects_unknown_operator() {
        let err = Calculator::parse_input("5 ^ 3").unwrap_err();
        assert_eq!(err, "Unsupported operator: ^");
    }

    #[test]
    fn test_calculate_operations() {
        let mut calc = Calculator::new();
        let cases = [
            ("5 + 3", 8.0),
            ("10 - 2", 8.0),
            ("4 * 7", 28.0),
            ("15 / 3", 5.0),
            ("2 ** 3", 8.0),
            ("10 % 3", 1.0),
        ];
        for (line, expected) in cases {
            let input = Calculator::parse_input(line).unwrap();
            assert_eq!(calc.calculate(input).unwrap(), expected, "{}", line);
        }
    }

    #[test]
    fn test_calculate_division_by_zero() {
        let mut calc = Calculator::new();
        let input = Calculator::parse_input("1 / 0").unwrap();
        assert_eq!(calc.calculate(input).unwrap_err(), "Cannot divide by zero");
        assert_eq!(calc.last_result(), None);
    }

    #[test]
    fn test_calculate_modulo_with_zero() {
        let mut calc = Calculator::new();
        let input = Calculator::parse_input("10 % 0").unwrap();
        assert_eq!(
            calc.calculate(input).unwrap_err(),
            "Cannot perform modulo with zero"
        );
    }

    #[test]
    fn test_last_result_recall() {
        let mut calc = Calculator::new();
        assert_eq!(calc.last_result(), None);

        let input = Calculator::parse_input("6 * 7").unwrap();
        calc.calculate(input).unwrap();
        assert_eq!(calc.last_result(), Some(42.0));
    }
}
