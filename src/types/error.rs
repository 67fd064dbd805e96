use thiserror::Error;

use crate::parse::ParseError;

/// Errors raised while compiling a rule tree into executable units.
///
/// Every variant names the offending rule so a misauthored workflow can be
/// traced back to its definition.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid expression in rule '{rule}' ('{expression}'): {source}")]
    InvalidExpression {
        rule: String,
        expression: String,
        #[source]
        source: ParseError,
    },

    #[error("unknown identifier '{identifier}' in rule '{rule}' ('{expression}')")]
    UnknownIdentifier {
        rule: String,
        identifier: String,
        expression: String,
    },

    #[error("unknown function '{function}' in rule '{rule}'")]
    UnknownFunction { rule: String, function: String },

    #[error("rule '{rule}' has sub-rules but no combination operator")]
    MissingOperator { rule: String },

    #[error("rule '{rule}' has no expression and no sub-rules")]
    MissingExpression { rule: String },

    #[error("rule '{rule}' declares local params but uses the Direct dialect")]
    LocalParamsNotAllowed { rule: String },

    #[error("duplicate local param '{name}' in rule '{rule}'")]
    DuplicateLocalParam { rule: String, name: String },

    #[error("invalid record(...) call in rule '{rule}': {message}")]
    InvalidRecordCall { rule: String, message: String },
}
