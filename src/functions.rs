use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::evaluate::EvalError;
use crate::Value;

/// A helper function callable from rule expressions.
pub type HelperFn = dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync;

/// Registry of helper functions expressions may call by name.
///
/// Call names are checked against the registry at compile time, so a typo'd
/// function name is a compile error rather than a per-evaluation fault.
#[derive(Clone)]
pub struct FunctionRegistry {
    funcs: HashMap<String, Arc<HelperFn>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// An empty registry with no callable functions.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// A registry pre-populated with the builtin helpers: `len`, `contains`,
    /// `starts_with`, `ends_with`, `upper`, `lower`, `abs`, `min`, `max`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("len", builtin_len);
        registry.register("contains", builtin_contains);
        registry.register("starts_with", builtin_starts_with);
        registry.register("ends_with", builtin_ends_with);
        registry.register("upper", builtin_upper);
        registry.register("lower", builtin_lower);
        registry.register("abs", builtin_abs);
        registry.register("min", builtin_min);
        registry.register("max", builtin_max);
        registry
    }

    /// Register a helper under `name`, replacing any previous registration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) {
        self.funcs.insert(name.into(), Arc::new(f));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub(crate) fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        match self.funcs.get(name) {
            Some(f) => f(args),
            None => Err(EvalError::Function {
                name: name.to_owned(),
                message: "function is not registered".to_owned(),
            }),
        }
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Function {
            name: name.to_owned(),
            message: format!("expected {expected} argument(s), got {}", args.len()),
        })
    }
}

fn argument_fault(name: &str, args: &[Value]) -> EvalError {
    let kinds: Vec<&str> = args.iter().map(Value::kind).collect();
    EvalError::Function {
        name: name.to_owned(),
        message: format!("unsupported argument kinds: {}", kinds.join(", ")),
    }
}

#[allow(clippy::cast_possible_wrap)]
fn builtin_len(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("len", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::Array(items) => Ok(Value::Int(items.len() as i64)),
        Value::Object(fields) => Ok(Value::Int(fields.len() as i64)),
        _ => Err(argument_fault("len", args)),
    }
}

fn builtin_contains(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("contains", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (Value::Array(items), needle) => {
            Ok(Value::Bool(items.iter().any(|item| item.loose_eq(needle))))
        }
        _ => Err(argument_fault("contains", args)),
    }
}

fn builtin_starts_with(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("starts_with", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::String(s), Value::String(prefix)) => {
            Ok(Value::Bool(s.starts_with(prefix.as_str())))
        }
        _ => Err(argument_fault("starts_with", args)),
    }
}

fn builtin_ends_with(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("ends_with", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::String(s), Value::String(suffix)) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
        _ => Err(argument_fault("ends_with", args)),
    }
}

fn builtin_upper(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("upper", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::String(s.to_uppercase())),
        _ => Err(argument_fault("upper", args)),
    }
}

fn builtin_lower(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("lower", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        _ => Err(argument_fault("lower", args)),
    }
}

fn builtin_abs(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("abs", args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        _ => Err(argument_fault("abs", args)),
    }
}

fn fold_numeric(
    name: &'static str,
    args: &[Value],
    pick: impl Fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(EvalError::Function {
            name: name.to_owned(),
            message: "expected at least 1 argument".to_owned(),
        });
    }
    let mut best = &args[0];
    for candidate in &args[1..] {
        let (a, b) = match (best, candidate) {
            (Value::Int(a), Value::Int(b)) => (*a as f64, *b as f64),
            (Value::Int(a), Value::Float(b)) => (*a as f64, *b),
            (Value::Float(a), Value::Int(b)) => (*a, *b as f64),
            (Value::Float(a), Value::Float(b)) => (*a, *b),
            _ => return Err(argument_fault(name, args)),
        };
        if pick(b, a) {
            best = candidate;
        }
    }
    match best {
        Value::Int(_) | Value::Float(_) => Ok(best.clone()),
        _ => Err(argument_fault(name, args)),
    }
}

fn builtin_min(args: &[Value]) -> Result<Value, EvalError> {
    fold_numeric("min", args, |candidate, best| candidate < best)
}

fn builtin_max(args: &[Value]) -> Result<Value, EvalError> {
    fold_numeric("max", args, |candidate, best| candidate > best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(registry: &FunctionRegistry, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        registry.call(name, args)
    }

    #[test]
    fn builtins_are_registered() {
        let registry = FunctionRegistry::with_builtins();
        for name in [
            "len",
            "contains",
            "starts_with",
            "ends_with",
            "upper",
            "lower",
            "abs",
            "min",
            "max",
        ] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
    }

    #[test]
    fn len_of_string_array_object() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(
            call(&registry, "len", &[Value::from("héllo")]),
            Ok(Value::Int(5))
        );
        assert_eq!(
            call(&registry, "len", &[Value::Array(vec![Value::Int(1)])]),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn contains_substring_and_membership() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(
            call(
                &registry,
                "contains",
                &[Value::from("hello world"), Value::from("world")]
            ),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call(
                &registry,
                "contains",
                &[
                    Value::Array(vec![Value::Int(1), Value::Int(2)]),
                    Value::Float(2.0)
                ]
            ),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn min_max_mixed_numerics() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(
            call(
                &registry,
                "min",
                &[Value::Int(3), Value::Float(1.5), Value::Int(2)]
            ),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            call(&registry, "max", &[Value::Int(3), Value::Float(1.5)]),
            Ok(Value::Int(3))
        );
    }

    #[test]
    fn arity_mismatch_is_a_fault() {
        let registry = FunctionRegistry::with_builtins();
        assert!(call(&registry, "len", &[]).is_err());
        assert!(call(&registry, "contains", &[Value::from("x")]).is_err());
    }

    #[test]
    fn kind_mismatch_is_a_fault() {
        let registry = FunctionRegistry::with_builtins();
        assert!(call(&registry, "upper", &[Value::Int(1)]).is_err());
        assert!(call(&registry, "abs", &[Value::from("nope")]).is_err());
    }

    #[test]
    fn custom_function_registration() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register("always_true", |_args| Ok(Value::Bool(true)));
        assert!(registry.contains("always_true"));
        assert_eq!(call(&registry, "always_true", &[]), Ok(Value::Bool(true)));
    }

    #[test]
    fn unknown_function_is_a_fault() {
        let registry = FunctionRegistry::empty();
        assert!(call(&registry, "len", &[Value::from("x")]).is_err());
    }
}
