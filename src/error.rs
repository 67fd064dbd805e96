use thiserror::Error;

use crate::CompileError;

/// Errors surfaced by [`RulesEngine`](crate::RulesEngine) operations.
///
/// Runtime evaluation faults are deliberately absent: they are captured
/// per rule inside the returned result trees instead of failing the call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow '{0}' is not registered")]
    WorkflowNotFound(String),

    #[error("invalid workflow '{workflow}': {message}")]
    Validation { workflow: String, message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),
}
