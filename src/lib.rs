mod cache;
mod compile;
mod engine;
mod error;
mod evaluate;
mod functions;
mod parse;
mod types;

pub use cache::RulesCache;
pub use compile::CompiledRuleSet;
pub use engine::RulesEngine;
pub use error::EngineError;
pub use evaluate::EvalError;
pub use functions::FunctionRegistry;
pub use parse::{parse, ParseError};
pub use types::{
    ArithOp, CompareOp, CompileError, Expr, ExpressionType, LocalParam, ResultsExt,
    RuleDefinition, RuleOperator, RuleOutputs, RuleParameter, RuleResultTree, TypeSignature,
    Value, WorkflowDefinition,
};
