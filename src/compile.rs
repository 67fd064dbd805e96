use std::sync::Arc;

use crate::functions::FunctionRegistry;
use crate::types::CompiledExpr;
use crate::{CompileError, Expr, ExpressionType, RuleDefinition, RuleOperator, Value};

/// The executable form of one workflow under one input-type signature.
///
/// Holds one compiled unit per enabled top-level rule of the
/// (injection-expanded) workflow, in definition order. Built fully before it
/// is published into the cache; read-shared behind `Arc` thereafter.
#[derive(Debug)]
pub struct CompiledRuleSet {
    pub(crate) rules: Vec<CompiledRule>,
    /// Size of the per-invocation local-value table.
    pub(crate) local_slots: usize,
}

impl CompiledRuleSet {
    /// Number of top-level compiled units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// One compiled rule node: a leaf expression or a combinator over children.
#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub(crate) rule: Arc<RuleDefinition>,
    pub(crate) locals: Vec<CompiledLocal>,
    pub(crate) kind: CompiledKind,
}

#[derive(Debug)]
pub(crate) struct CompiledLocal {
    pub(crate) slot: usize,
    pub(crate) expr: CompiledExpr,
}

#[derive(Debug)]
pub(crate) enum CompiledKind {
    Leaf(CompiledExpr),
    Composite {
        operator: RuleOperator,
        children: Vec<CompiledRule>,
    },
}

/// Lexical scope during compilation: the ordered parameter names plus the
/// locals of every ancestor rule (and earlier locals of the current rule).
struct Scope<'a> {
    params: &'a [String],
    locals: Vec<(String, usize)>,
    next_slot: usize,
}

enum Binding {
    Param(usize),
    Local(usize),
}

impl Scope<'_> {
    fn resolve(&self, name: &str) -> Option<Binding> {
        // Locals shadow parameters; later locals shadow earlier ones.
        if let Some((_, slot)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Some(Binding::Local(*slot));
        }
        self.params
            .iter()
            .position(|p| p == name)
            .map(Binding::Param)
    }
}

/// Compile the (injection-expanded) top-level rules of a workflow against
/// the ordered parameter names of the triggering `execute` call.
///
/// Disabled rules are omitted entirely. Identifiers resolve to parameter
/// positions, so the result is reusable for any later call whose inputs
/// share the same ordered type signature.
pub(crate) fn compile(
    rules: &[RuleDefinition],
    param_names: &[String],
    functions: &FunctionRegistry,
) -> Result<CompiledRuleSet, CompileError> {
    let mut scope = Scope {
        params: param_names,
        locals: Vec::new(),
        next_slot: 0,
    };

    let mut compiled = Vec::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        compiled.push(compile_rule(rule, &mut scope, functions)?);
    }

    Ok(CompiledRuleSet {
        rules: compiled,
        local_slots: scope.next_slot,
    })
}

fn compile_rule(
    rule: &RuleDefinition,
    scope: &mut Scope<'_>,
    functions: &FunctionRegistry,
) -> Result<CompiledRule, CompileError> {
    let scope_depth = scope.locals.len();

    if !rule.local_params.is_empty() && rule.expression_type != ExpressionType::ScopedLambda {
        return Err(CompileError::LocalParamsNotAllowed {
            rule: rule.rule_name.clone(),
        });
    }

    let mut locals = Vec::with_capacity(rule.local_params.len());
    for local in &rule.local_params {
        if rule.local_params.iter().filter(|l| l.name == local.name).count() > 1 {
            return Err(CompileError::DuplicateLocalParam {
                rule: rule.rule_name.clone(),
                name: local.name.clone(),
            });
        }
        // Earlier locals are visible to later ones.
        let expr = compile_expression(&local.expression, &rule.rule_name, scope, functions)?;
        let slot = scope.next_slot;
        scope.next_slot += 1;
        scope.locals.push((local.name.clone(), slot));
        locals.push(CompiledLocal { slot, expr });
    }

    let kind = if rule.sub_rules.is_empty() {
        if rule.expression.trim().is_empty() {
            return Err(CompileError::MissingExpression {
                rule: rule.rule_name.clone(),
            });
        }
        CompiledKind::Leaf(compile_expression(
            &rule.expression,
            &rule.rule_name,
            scope,
            functions,
        )?)
    } else {
        let operator = match rule.operator {
            RuleOperator::AndAlso | RuleOperator::OrElse => rule.operator,
            RuleOperator::None => {
                return Err(CompileError::MissingOperator {
                    rule: rule.rule_name.clone(),
                });
            }
        };
        let mut children = Vec::new();
        for child in rule.sub_rules.iter().filter(|r| r.enabled) {
            children.push(compile_rule(child, scope, functions)?);
        }
        CompiledKind::Composite { operator, children }
    };

    // This rule's locals stay visible to its descendants only.
    scope.locals.truncate(scope_depth);

    Ok(CompiledRule {
        rule: Arc::new(rule.clone()),
        locals,
        kind,
    })
}

fn compile_expression(
    text: &str,
    rule_name: &str,
    scope: &Scope<'_>,
    functions: &FunctionRegistry,
) -> Result<CompiledExpr, CompileError> {
    let parsed = crate::parse::parse(text).map_err(|source| CompileError::InvalidExpression {
        rule: rule_name.to_owned(),
        expression: text.to_owned(),
        source,
    })?;
    resolve(&parsed, rule_name, text, scope, functions)
}

fn resolve(
    expr: &Expr,
    rule_name: &str,
    text: &str,
    scope: &Scope<'_>,
    functions: &FunctionRegistry,
) -> Result<CompiledExpr, CompileError> {
    Ok(match expr {
        Expr::Literal(v) => CompiledExpr::Literal(v.clone()),
        Expr::Ident(name) => match scope.resolve(name) {
            Some(Binding::Param(i)) => CompiledExpr::ParamRef(i),
            Some(Binding::Local(slot)) => CompiledExpr::LocalRef(slot),
            None => {
                return Err(CompileError::UnknownIdentifier {
                    rule: rule_name.to_owned(),
                    identifier: name.clone(),
                    expression: text.to_owned(),
                })
            }
        },
        Expr::Member(base, field) => CompiledExpr::Member(
            Box::new(resolve(base, rule_name, text, scope, functions)?),
            field.clone(),
        ),
        Expr::Not(inner) => {
            CompiledExpr::Not(Box::new(resolve(inner, rule_name, text, scope, functions)?))
        }
        Expr::Neg(inner) => {
            CompiledExpr::Neg(Box::new(resolve(inner, rule_name, text, scope, functions)?))
        }
        Expr::And(a, b) => CompiledExpr::And(
            Box::new(resolve(a, rule_name, text, scope, functions)?),
            Box::new(resolve(b, rule_name, text, scope, functions)?),
        ),
        Expr::Or(a, b) => CompiledExpr::Or(
            Box::new(resolve(a, rule_name, text, scope, functions)?),
            Box::new(resolve(b, rule_name, text, scope, functions)?),
        ),
        Expr::Compare { lhs, op, rhs } => CompiledExpr::Compare {
            lhs: Box::new(resolve(lhs, rule_name, text, scope, functions)?),
            op: *op,
            rhs: Box::new(resolve(rhs, rule_name, text, scope, functions)?),
        },
        Expr::Arith { lhs, op, rhs } => CompiledExpr::Arith {
            lhs: Box::new(resolve(lhs, rule_name, text, scope, functions)?),
            op: *op,
            rhs: Box::new(resolve(rhs, rule_name, text, scope, functions)?),
        },
        Expr::Call { name, args } if name == "record" => {
            let (key, value) = match args.as_slice() {
                [Expr::Literal(Value::String(key)), value] => (key.clone(), value),
                _ => {
                    return Err(CompileError::InvalidRecordCall {
                        rule: rule_name.to_owned(),
                        message: "expected record(\"key\", expression)".to_owned(),
                    })
                }
            };
            CompiledExpr::Record {
                key,
                value: Box::new(resolve(value, rule_name, text, scope, functions)?),
            }
        }
        Expr::Call { name, args } => {
            if !functions.contains(name) {
                return Err(CompileError::UnknownFunction {
                    rule: rule_name.to_owned(),
                    function: name.clone(),
                });
            }
            let args = args
                .iter()
                .map(|arg| resolve(arg, rule_name, text, scope, functions))
                .collect::<Result<Vec<_>, _>>()?;
            CompiledExpr::Call {
                name: name.clone(),
                args,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalParam;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    fn compile_one(rule: RuleDefinition, names: &[&str]) -> Result<CompiledRuleSet, CompileError> {
        compile(&[rule], &params(names), &FunctionRegistry::with_builtins())
    }

    #[test]
    fn compile_leaf_rule() {
        let set = compile_one(
            RuleDefinition::new("isAdult", "input1.age >= 18"),
            &["input1"],
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert!(matches!(set.rules[0].kind, CompiledKind::Leaf(_)));
    }

    #[test]
    fn identifier_resolves_to_parameter_position() {
        let set = compile_one(RuleDefinition::new("r", "second > first"), &["first", "second"])
            .unwrap();
        match &set.rules[0].kind {
            CompiledKind::Leaf(CompiledExpr::Compare { lhs, rhs, .. }) => {
                assert_eq!(**lhs, CompiledExpr::ParamRef(1));
                assert_eq!(**rhs, CompiledExpr::ParamRef(0));
            }
            other => panic!("expected compiled comparison, got {other:?}"),
        }
    }

    #[test]
    fn unknown_identifier_is_compile_time() {
        let err = compile_one(RuleDefinition::new("r", "inpt1.age >= 18"), &["input1"])
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownIdentifier { ref identifier, .. } if identifier == "inpt1"
        ));
    }

    #[test]
    fn malformed_expression_names_the_rule() {
        let err = compile_one(RuleDefinition::new("broken", "input1.age >="), &["input1"])
            .unwrap_err();
        match err {
            CompileError::InvalidExpression { rule, expression, .. } => {
                assert_eq!(rule, "broken");
                assert_eq!(expression, "input1.age >=");
            }
            other => panic!("expected InvalidExpression, got {other:?}"),
        }
    }

    #[test]
    fn unknown_function_is_compile_time() {
        let err = compile_one(RuleDefinition::new("r", "lenght(input1) > 0"), &["input1"])
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownFunction { ref function, .. } if function == "lenght"
        ));
    }

    #[test]
    fn composite_without_operator_rejected() {
        let rule = RuleDefinition::group(
            "group",
            RuleOperator::None,
            vec![RuleDefinition::new("a", "input1 > 0")],
        );
        let err = compile_one(rule, &["input1"]).unwrap_err();
        assert!(matches!(err, CompileError::MissingOperator { .. }));
    }

    #[test]
    fn leaf_without_expression_rejected() {
        let err = compile_one(RuleDefinition::new("empty", "   "), &["input1"]).unwrap_err();
        assert!(matches!(err, CompileError::MissingExpression { .. }));
    }

    #[test]
    fn disabled_rules_are_omitted() {
        let set = compile(
            &[
                RuleDefinition::new("keep", "input1 > 0"),
                RuleDefinition::new("skip", "input1 > 0").disabled(),
            ],
            &params(&["input1"]),
            &FunctionRegistry::with_builtins(),
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.rules[0].rule.rule_name, "keep");
    }

    #[test]
    fn disabled_children_excluded_from_composite() {
        let rule = RuleDefinition::group(
            "group",
            RuleOperator::AndAlso,
            vec![
                RuleDefinition::new("a", "input1 > 0"),
                RuleDefinition::new("b", "input1 > 0").disabled(),
            ],
        );
        let set = compile_one(rule, &["input1"]).unwrap();
        match &set.rules[0].kind {
            CompiledKind::Composite { children, .. } => assert_eq!(children.len(), 1),
            other => panic!("expected Composite, got {other:?}"),
        }
    }

    #[test]
    fn local_params_require_scoped_lambda() {
        let mut rule = RuleDefinition::new("r", "doubled > 10");
        rule.local_params = vec![LocalParam {
            name: "doubled".to_owned(),
            expression: "input1 * 2".to_owned(),
        }];
        // expression_type left at Direct
        let err = compile_one(rule, &["input1"]).unwrap_err();
        assert!(matches!(err, CompileError::LocalParamsNotAllowed { .. }));
    }

    #[test]
    fn local_params_bind_in_scope() {
        let rule = RuleDefinition::new("r", "doubled > 10").with_local_params(vec![LocalParam {
            name: "doubled".to_owned(),
            expression: "input1 * 2".to_owned(),
        }]);
        let set = compile_one(rule, &["input1"]).unwrap();
        assert_eq!(set.local_slots, 1);
        match &set.rules[0].kind {
            CompiledKind::Leaf(CompiledExpr::Compare { lhs, .. }) => {
                assert_eq!(**lhs, CompiledExpr::LocalRef(0));
            }
            other => panic!("expected leaf comparison, got {other:?}"),
        }
    }

    #[test]
    fn local_visible_to_descendants_but_not_siblings() {
        let parent = RuleDefinition::group(
            "parent",
            RuleOperator::AndAlso,
            vec![RuleDefinition::new("child", "doubled > 10")],
        )
        .with_local_params(vec![LocalParam {
            name: "doubled".to_owned(),
            expression: "input1 * 2".to_owned(),
        }]);
        let sibling = RuleDefinition::new("sibling", "doubled > 10");

        assert!(compile(
            &[parent.clone()],
            &params(&["input1"]),
            &FunctionRegistry::with_builtins()
        )
        .is_ok());

        let err = compile(
            &[parent, sibling],
            &params(&["input1"]),
            &FunctionRegistry::with_builtins(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownIdentifier { ref rule, .. } if rule == "sibling"
        ));
    }

    #[test]
    fn duplicate_local_param_rejected() {
        let rule = RuleDefinition::new("r", "x > 0").with_local_params(vec![
            LocalParam {
                name: "x".to_owned(),
                expression: "input1".to_owned(),
            },
            LocalParam {
                name: "x".to_owned(),
                expression: "input1 * 2".to_owned(),
            },
        ]);
        let err = compile_one(rule, &["input1"]).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateLocalParam { .. }));
    }

    #[test]
    fn record_special_form_compiles() {
        let set = compile_one(
            RuleDefinition::new("r", "record(\"score\", input1 * 2) > 10"),
            &["input1"],
        )
        .unwrap();
        match &set.rules[0].kind {
            CompiledKind::Leaf(CompiledExpr::Compare { lhs, .. }) => {
                assert!(matches!(**lhs, CompiledExpr::Record { .. }));
            }
            other => panic!("expected leaf comparison, got {other:?}"),
        }
    }

    #[test]
    fn record_with_non_literal_key_rejected() {
        let err = compile_one(
            RuleDefinition::new("r", "record(input1, 2) > 0"),
            &["input1"],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidRecordCall { .. }));
    }
}
