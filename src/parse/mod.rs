mod error;
mod grammar;

pub use error::ParseError;

use crate::Expr;

/// Parse one rule expression into an [`Expr`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::parse_expression
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
