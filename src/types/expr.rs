use std::fmt;

use super::Value;

/// Comparison operators supported in rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Arithmetic operators supported in rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parsed expression AST over named inputs.
///
/// Produced by [`parse`](crate::parse::parse) from a rule's expression text
/// and transformed into [`CompiledExpr`] during compilation, which resolves
/// every root identifier to a parameter position or local slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    /// Member access on a structured value, e.g. `input1.age`.
    Member(Box<Expr>, String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        lhs: Box<Expr>,
        op: CompareOp,
        rhs: Box<Expr>,
    },
    Arith {
        lhs: Box<Expr>,
        op: ArithOp,
        rhs: Box<Expr>,
    },
    /// Call to a registered helper function.
    Call { name: String, args: Vec<Expr> },
}

/// Expression with identifier lookups resolved to integer slots.
///
/// `ParamRef` indexes the ordered evaluation parameters; `LocalRef` indexes
/// the per-invocation local-value table built from `local_params`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledExpr {
    Literal(Value),
    ParamRef(usize),
    LocalRef(usize),
    Member(Box<CompiledExpr>, String),
    Not(Box<CompiledExpr>),
    Neg(Box<CompiledExpr>),
    And(Box<CompiledExpr>, Box<CompiledExpr>),
    Or(Box<CompiledExpr>, Box<CompiledExpr>),
    Compare {
        lhs: Box<CompiledExpr>,
        op: CompareOp,
        rhs: Box<CompiledExpr>,
    },
    Arith {
        lhs: Box<CompiledExpr>,
        op: ArithOp,
        rhs: Box<CompiledExpr>,
    },
    Call {
        name: String,
        args: Vec<CompiledExpr>,
    },
    /// `record(key, expr)`: write the evaluated value into the output
    /// carrier and yield it.
    Record {
        key: String,
        value: Box<CompiledExpr>,
    },
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "+"),
            ArithOp::Sub => write!(f, "-"),
            ArithOp::Mul => write!(f, "*"),
            ArithOp::Div => write!(f, "/"),
            ArithOp::Rem => write!(f, "%"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Member(base, field) => write!(f, "{base}.{field}"),
            Expr::Not(inner) => write!(f, "(NOT {inner})"),
            Expr::Neg(inner) => write!(f, "(-{inner})"),
            Expr::And(a, b) => write!(f, "({a} AND {b})"),
            Expr::Or(a, b) => write!(f, "({a} OR {b})"),
            Expr::Compare { lhs, op, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Arith { lhs, op, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
