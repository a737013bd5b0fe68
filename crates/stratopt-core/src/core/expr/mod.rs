//! Sandboxed scalar expressions for combining solver responses into one objective.
//!
//! An [`Expression`] is parsed against a fixed table of variable names (`w1`, `w2`, ...)
//! and can call only `abs`, `sqrt`, `sin`, `cos`, `tan`, `exp` and `log`. Any other
//! identifier is rejected when the expression is parsed, so evaluation never needs to
//! resolve names.
//!
//! ```
//! use stratopt::core::expr::Expression;
//!
//! let vars = vec!["w1".to_string(), "w2".to_string()];
//! let expr = Expression::parse("sqrt(w1**2 + w2**2)", &vars).unwrap();
//! assert_eq!(expr.eval(&[3.0, 4.0]).unwrap(), 5.0);
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::Function;

use ast::Node;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression is empty")]
    Empty,
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("Invalid number '{text}' at position {pos}")]
    InvalidNumber { pos: usize, text: String },
    #[error("Unexpected '{found}' at position {pos}")]
    UnexpectedToken { pos: usize, found: String },
    #[error("Unexpected end of expression at position {pos}")]
    UnexpectedEnd { pos: usize },
    #[error("Unknown variable '{name}'")]
    UnknownIdentifier { name: String },
    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("Function '{function}' called with {found} arguments")]
    Arity { function: &'static str, found: usize },
    #[error("No value supplied for variable #{index}")]
    MissingValue { index: usize },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Math domain error: {function}({value})")]
    Domain { function: &'static str, value: f64 },
    #[error("Expression evaluated to a non-finite value ({value})")]
    NonFinite { value: f64 },
}

/// A parsed objective expression bound to an ordered set of variable names.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    variables: Vec<String>,
    root: Node,
}

impl Expression {
    /// Parses `source`, resolving every identifier against `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] for syntax errors, unknown variables or functions, and calls
    /// with the wrong number of arguments.
    pub fn parse(source: &str, variables: &[String]) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(source)?;
        let root = parser::Parser::new(&tokens, variables, source.len()).parse()?;
        Ok(Self {
            source: source.to_string(),
            variables: variables.to_vec(),
            root,
        })
    }

    /// Evaluates the expression with `values[i]` bound to `variables[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] on division by zero, a math domain error, or a non-finite result.
    pub fn eval(&self, values: &[f64]) -> Result<f64, ExprError> {
        let value = self.root.eval(values)?;
        if !value.is_finite() {
            return Err(ExprError::NonFinite { value });
        }
        Ok(value)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Names of the response variables for `count` responses: `w1..=wN`.
pub fn response_variables(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("w{i}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(n: usize) -> Vec<String> {
        response_variables(n)
    }

    fn eval(source: &str, values: &[f64]) -> Result<f64, ExprError> {
        Expression::parse(source, &vars(values.len()))?.eval(values)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3", &[]).unwrap(), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[]).unwrap(), 9.0);
        assert_eq!(eval("10 - 4 - 3", &[]).unwrap(), 3.0);
        assert_eq!(eval("2 ** 3 ** 2", &[]).unwrap(), 512.0);
        assert_eq!(eval("-2 ** 2", &[]).unwrap(), -4.0);
        assert_eq!(eval("2 ** -1", &[]).unwrap(), 0.5);
        assert_eq!(eval("7 % 4", &[]).unwrap(), 3.0);
    }

    #[test]
    fn variables_and_functions() {
        assert_eq!(eval("w1 + 0.5*w2", &[2.0, 4.0]).unwrap(), 4.0);
        assert_eq!(eval("abs(w1)", &[-3.0]).unwrap(), 3.0);
        assert!((eval("log(exp(w1))", &[1.5]).unwrap() - 1.5).abs() < 1e-12);
        assert!((eval("sin(w1)**2 + cos(w1)**2", &[0.3]).unwrap() - 1.0).abs() < 1e-12);
        assert!((eval("tan(0)", &[]).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn rejects_names_outside_the_symbol_table() {
        assert_eq!(
            Expression::parse("w3 + 1", &vars(2)),
            Err(ExprError::UnknownIdentifier { name: "w3".into() })
        );
        assert_eq!(
            Expression::parse("open(w1)", &vars(1)),
            Err(ExprError::UnknownFunction {
                name: "open".into()
            })
        );
        assert!(Expression::parse("__import__", &vars(1)).is_err());
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(Expression::parse("", &vars(1)), Err(ExprError::Empty));
        assert_eq!(
            Expression::parse("w1 +", &vars(1)),
            Err(ExprError::UnexpectedEnd { pos: 4 })
        );
        assert!(matches!(
            Expression::parse("w1 w1", &vars(1)),
            Err(ExprError::UnexpectedToken { pos: 3, .. })
        ));
        assert!(matches!(
            Expression::parse("(w1", &vars(1)),
            Err(ExprError::UnexpectedEnd { .. })
        ));
        assert_eq!(
            Expression::parse("sqrt(1, 2)", &vars(0)),
            Err(ExprError::Arity {
                function: "sqrt",
                found: 2
            })
        );
    }

    #[test]
    fn evaluation_errors() {
        assert_eq!(eval("w1 / 0", &[1.0]), Err(ExprError::DivisionByZero));
        assert!(matches!(
            eval("sqrt(w1)", &[-4.0]),
            Err(ExprError::Domain { function: "sqrt", .. })
        ));
        assert!(matches!(
            eval("exp(w1)", &[1.0e4]),
            Err(ExprError::NonFinite { .. })
        ));
        assert!(matches!(
            eval("w1 ** 0.5", &[-1.0]),
            Err(ExprError::NonFinite { .. })
        ));
    }

    #[test]
    fn display_shows_the_source() {
        let expr = Expression::parse("w1*2", &vars(1)).unwrap();
        assert_eq!(expr.to_string(), "w1*2");
        assert_eq!(expr.variables(), &["w1".to_string()]);
    }
}
