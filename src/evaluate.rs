use thiserror::Error;

use crate::compile::{CompiledKind, CompiledRule, CompiledRuleSet};
use crate::functions::FunctionRegistry;
use crate::types::CompiledExpr;
use crate::{ArithOp, RuleOperator, RuleOutputs, RuleResultTree, Value};

/// Runtime fault raised while evaluating a compiled expression.
///
/// Faults never cross the evaluation boundary: they are captured into the
/// owning rule's [`RuleResultTree`] so sibling rules keep running. The type
/// is public so custom helper functions can raise faults of their own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown field '{field}' on {base} value")]
    UnknownField { field: String, base: &'static str },

    #[error("cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("expected a bool for {context}, got {kind}")]
    NotBoolean {
        context: &'static str,
        kind: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("helper '{name}' failed: {message}")]
    Function { name: String, message: String },
}

/// Per-invocation evaluation state: the ordered parameter values, the
/// local-value table, the helper registry, and the output carrier.
struct EvalContext<'a> {
    params: &'a [Value],
    locals: Vec<Value>,
    functions: &'a FunctionRegistry,
    outputs: RuleOutputs,
}

/// Invoke every top-level compiled unit against the given parameter values,
/// producing one result tree per unit in workflow rule order.
pub(crate) fn evaluate_set(
    set: &CompiledRuleSet,
    params: &[Value],
    functions: &FunctionRegistry,
) -> Vec<RuleResultTree> {
    set.rules
        .iter()
        .map(|rule| {
            let mut ctx = EvalContext {
                params,
                locals: vec![Value::Null; set.local_slots],
                functions,
                outputs: RuleOutputs::default(),
            };
            let mut tree = eval_rule(rule, &mut ctx);
            tree.attach_outputs(ctx.outputs);
            tree
        })
        .collect()
}

fn eval_rule(rule: &CompiledRule, ctx: &mut EvalContext<'_>) -> RuleResultTree {
    // Locals are computed on entry so they are visible to this rule's
    // expression and to every descendant. A faulting local fails the rule.
    for local in &rule.locals {
        match eval_expr(&local.expr, ctx) {
            Ok(v) => ctx.locals[local.slot] = v,
            Err(e) => {
                return RuleResultTree::new(rule.rule.clone(), false, vec![], Some(e.to_string()))
            }
        }
    }

    match &rule.kind {
        CompiledKind::Leaf(expr) => match eval_expr(expr, ctx) {
            Ok(Value::Bool(success)) => {
                RuleResultTree::new(rule.rule.clone(), success, vec![], None)
            }
            Ok(other) => RuleResultTree::new(
                rule.rule.clone(),
                false,
                vec![],
                Some(
                    EvalError::NotBoolean {
                        context: "rule outcome",
                        kind: other.kind(),
                    }
                    .to_string(),
                ),
            ),
            Err(e) => RuleResultTree::new(rule.rule.clone(), false, vec![], Some(e.to_string())),
        },
        CompiledKind::Composite { operator, children } => {
            eval_composite(rule, *operator, children, ctx)
        }
    }
}

fn eval_composite(
    rule: &CompiledRule,
    operator: RuleOperator,
    children: &[CompiledRule],
    ctx: &mut EvalContext<'_>,
) -> RuleResultTree {
    let mut results = Vec::new();
    let success = match operator {
        // Children run left to right; the first failing or faulting child
        // stops the walk. Children not executed are absent from the
        // results, not reported as failed.
        RuleOperator::AndAlso => {
            let mut all = true;
            for child in children {
                let result = eval_rule(child, ctx);
                let ok = result.is_success();
                results.push(result);
                if !ok {
                    all = false;
                    break;
                }
            }
            all
        }
        RuleOperator::OrElse => {
            let mut any = false;
            for child in children {
                let result = eval_rule(child, ctx);
                let ok = result.is_success();
                results.push(result);
                if ok {
                    any = true;
                    break;
                }
            }
            any
        }
        // Rejected at compile time.
        RuleOperator::None => false,
    };
    RuleResultTree::new(rule.rule.clone(), success, results, None)
}

fn eval_expr(expr: &CompiledExpr, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    match expr {
        CompiledExpr::Literal(v) => Ok(v.clone()),
        CompiledExpr::ParamRef(i) => Ok(ctx.params[*i].clone()),
        CompiledExpr::LocalRef(slot) => Ok(ctx.locals[*slot].clone()),
        CompiledExpr::Member(base, field) => {
            let base = eval_expr(base, ctx)?;
            match base {
                Value::Object(mut fields) => {
                    fields.remove(field).ok_or_else(|| EvalError::UnknownField {
                        field: field.clone(),
                        base: "object",
                    })
                }
                other => Err(EvalError::UnknownField {
                    field: field.clone(),
                    base: other.kind(),
                }),
            }
        }
        CompiledExpr::Not(inner) => match eval_expr(inner, ctx)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(EvalError::NotBoolean {
                context: "NOT operand",
                kind: other.kind(),
            }),
        },
        CompiledExpr::Neg(inner) => match eval_expr(inner, ctx)? {
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvalError::TypeMismatch {
                op: "-".to_owned(),
                lhs: other.kind(),
                rhs: "nothing",
            }),
        },
        CompiledExpr::And(a, b) => match eval_expr(a, ctx)? {
            Value::Bool(false) => Ok(Value::Bool(false)),
            Value::Bool(true) => expect_bool(eval_expr(b, ctx)?, "AND operand"),
            other => Err(EvalError::NotBoolean {
                context: "AND operand",
                kind: other.kind(),
            }),
        },
        CompiledExpr::Or(a, b) => match eval_expr(a, ctx)? {
            Value::Bool(true) => Ok(Value::Bool(true)),
            Value::Bool(false) => expect_bool(eval_expr(b, ctx)?, "OR operand"),
            other => Err(EvalError::NotBoolean {
                context: "OR operand",
                kind: other.kind(),
            }),
        },
        CompiledExpr::Compare { lhs, op, rhs } => {
            let lhs = eval_expr(lhs, ctx)?;
            let rhs = eval_expr(rhs, ctx)?;
            lhs.compare(*op, &rhs)
                .map(Value::Bool)
                .ok_or_else(|| EvalError::TypeMismatch {
                    op: op.to_string(),
                    lhs: lhs.kind(),
                    rhs: rhs.kind(),
                })
        }
        CompiledExpr::Arith { lhs, op, rhs } => {
            let lhs = eval_expr(lhs, ctx)?;
            let rhs = eval_expr(rhs, ctx)?;
            eval_arith(&lhs, *op, &rhs)
        }
        CompiledExpr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            ctx.functions.call(name, &args)
        }
        CompiledExpr::Record { key, value } => {
            let v = eval_expr(value, ctx)?;
            ctx.outputs.insert(key.clone(), v.clone());
            Ok(v)
        }
    }
}

fn expect_bool(value: Value, context: &'static str) -> Result<Value, EvalError> {
    match value {
        Value::Bool(_) => Ok(value),
        other => Err(EvalError::NotBoolean {
            context,
            kind: other.kind(),
        }),
    }
}

#[allow(clippy::cast_precision_loss)]
fn eval_arith(lhs: &Value, op: ArithOp, rhs: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.to_string(),
        lhs: lhs.kind(),
        rhs: rhs.kind(),
    };
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            ArithOp::Add => Ok(Value::Int(a.wrapping_add(*b))),
            ArithOp::Sub => Ok(Value::Int(a.wrapping_sub(*b))),
            ArithOp::Mul => Ok(Value::Int(a.wrapping_mul(*b))),
            ArithOp::Div => a
                .checked_div(*b)
                .map(Value::Int)
                .ok_or(EvalError::DivisionByZero),
            ArithOp::Rem => a
                .checked_rem(*b)
                .map(Value::Int)
                .ok_or(EvalError::DivisionByZero),
        },
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(lhs);
            let b = as_f64(rhs);
            Ok(Value::Float(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            }))
        }
        (Value::String(a), Value::String(b)) if op == ArithOp::Add => {
            Ok(Value::String(format!("{a}{b}")))
        }
        _ => Err(mismatch()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}
