mod error;
mod expr;
mod param;
mod result_tree;
mod rule;
mod value;
mod workflow;

pub use error::CompileError;
pub use expr::{ArithOp, CompareOp, Expr};
pub use param::RuleParameter;
pub use result_tree::{ResultsExt, RuleOutputs, RuleResultTree};
pub use rule::{ExpressionType, LocalParam, RuleDefinition, RuleOperator};
pub use value::{TypeSignature, Value};
pub use workflow::WorkflowDefinition;

pub(crate) use expr::CompiledExpr;
