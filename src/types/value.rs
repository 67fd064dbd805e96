use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::CompareOp;

/// Runtime value supplied to (and produced by) rule expressions.
///
/// Inputs are structured: an `Object` models the named input records that
/// expressions dereference with member access (`input1.age`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absent value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A record of named fields.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Short kind name used in fault messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Compare this value to another using the given operator.
    ///
    /// Equality operators are total (structural, with int/float coercion).
    /// Ordering operators return `None` for operands that have no defined
    /// order (mixed kinds, bools, arrays, objects); the evaluator reports
    /// that as a runtime fault.
    #[must_use]
    pub fn compare(&self, op: CompareOp, other: &Value) -> Option<bool> {
        match op {
            CompareOp::Eq => Some(self.loose_eq(other)),
            CompareOp::Neq => Some(!self.loose_eq(other)),
            CompareOp::Gt => Some(self.partial_cmp_value(other)? == Ordering::Greater),
            CompareOp::Gte => Some(self.partial_cmp_value(other)? != Ordering::Less),
            CompareOp::Lt => Some(self.partial_cmp_value(other)? == Ordering::Less),
            CompareOp::Lte => Some(self.partial_cmp_value(other)? != Ordering::Greater),
        }
    }

    /// Structural equality with int/float numeric coercion.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            (a, b) => a == b,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Derive the shape descriptor used in the compiled-set cache key.
    #[must_use]
    pub fn signature(&self) -> TypeSignature {
        match self {
            Value::Null => TypeSignature::Null,
            Value::Bool(_) => TypeSignature::Bool,
            Value::Int(_) => TypeSignature::Int,
            Value::Float(_) => TypeSignature::Float,
            Value::String(_) => TypeSignature::String,
            Value::Array(items) => {
                TypeSignature::Array(items.first().map(|v| Box::new(v.signature())))
            }
            Value::Object(fields) => TypeSignature::Object(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), v.signature()))
                    .collect(),
            ),
        }
    }
}

/// Static shape of a [`Value`], used to key compiled rule sets.
///
/// Two inputs share a signature when they have the same kind and, for
/// objects, the same field names with matching field signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    Null,
    Bool,
    Int,
    Float,
    String,
    /// Element signature of the first element; `None` for an empty array.
    Array(Option<Box<TypeSignature>>),
    Object(BTreeMap<String, TypeSignature>),
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Null => write!(f, "null"),
            TypeSignature::Bool => write!(f, "bool"),
            TypeSignature::Int => write!(f, "int"),
            TypeSignature::Float => write!(f, "float"),
            TypeSignature::String => write!(f, "string"),
            TypeSignature::Array(None) => write!(f, "array<>"),
            TypeSignature::Array(Some(elem)) => write!(f, "array<{elem}>"),
            TypeSignature::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, sig)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {sig}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(name, v)| (name, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
