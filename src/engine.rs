use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{RulesCache, WorkflowEntry};
use crate::compile::CompiledRuleSet;
use crate::functions::FunctionRegistry;
use crate::{
    EngineError, RuleDefinition, RuleParameter, RuleResultTree, TypeSignature, Value,
    WorkflowDefinition,
};

/// The engine facade: registers workflows, compiles their rules on first
/// use per input-type signature, and evaluates them against typed inputs.
///
/// All compilation and evaluation happen synchronously on the calling
/// thread; the engine itself is safe to share across threads.
///
/// # Example
///
/// ```
/// use ruleflow::{RulesEngine, RuleDefinition, Value, WorkflowDefinition};
///
/// let engine = RulesEngine::new();
/// engine
///     .add_workflows([WorkflowDefinition::new(
///         "ageCheck",
///         vec![RuleDefinition::new("isAdult", "input1.age >= 18")],
///     )])
///     .unwrap();
///
/// let input = Value::from(serde_json::json!({ "age": 20 }));
/// let results = engine.execute_values("ageCheck", vec![input]).unwrap();
/// assert!(results[0].is_success());
/// ```
#[derive(Debug, Default)]
pub struct RulesEngine {
    cache: RulesCache,
    functions: FunctionRegistry,
}

impl RulesEngine {
    /// An engine with the builtin helper functions registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine using a caller-supplied helper registry.
    #[must_use]
    pub fn with_functions(functions: FunctionRegistry) -> Self {
        Self {
            cache: RulesCache::new(),
            functions,
        }
    }

    /// Register or replace workflows by name. Replacing a workflow drops
    /// every rule set compiled from its previous version.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for a structurally invalid
    /// definition; earlier workflows in the batch stay registered.
    pub fn add_workflows(
        &self,
        workflows: impl IntoIterator<Item = WorkflowDefinition>,
    ) -> Result<(), EngineError> {
        for workflow in workflows {
            validate(&workflow)?;
            self.cache.add_or_update(workflow);
        }
        Ok(())
    }

    /// Remove a workflow and its compiled rule sets. Returns whether the
    /// workflow was present.
    pub fn remove_workflow(&self, name: &str) -> bool {
        self.cache.remove(name)
    }

    /// Drop every workflow and every compiled rule set.
    pub fn clear_workflows(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn workflow_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of compiled rule sets cached for a workflow, one per
    /// distinct input-type signature seen so far.
    #[must_use]
    pub fn compiled_len(&self, name: &str) -> usize {
        self.cache.compiled_len(name)
    }

    /// Evaluate every top-level rule of a workflow against named inputs,
    /// returning one result tree per rule in definition order.
    ///
    /// The first call for a given ordered input-type signature compiles the
    /// workflow and caches the result; later calls with the same signature
    /// reuse it.
    ///
    /// # Errors
    ///
    /// [`EngineError::WorkflowNotFound`] if the workflow (or one of its
    /// injected workflows) is not registered; [`EngineError::Compile`] if
    /// an expression fails to compile. Runtime evaluation faults do not
    /// error: they are captured per rule inside the result trees.
    pub fn execute(
        &self,
        workflow_name: &str,
        params: &[RuleParameter],
    ) -> Result<Vec<RuleResultTree>, EngineError> {
        let entry = self
            .cache
            .entry(workflow_name)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_name.to_owned()))?;

        let key: Vec<TypeSignature> = params.iter().map(|p| p.signature().clone()).collect();
        let compiled = match entry.compiled.get(&key) {
            Some(set) => Arc::clone(set.value()),
            None => {
                let set = Arc::new(self.compile_entry(&entry, params)?);
                entry.compiled.insert(key, Arc::clone(&set));
                set
            }
        };

        let values: Vec<Value> = params.iter().map(|p| p.value().clone()).collect();
        Ok(crate::evaluate::evaluate_set(
            &compiled,
            &values,
            &self.functions,
        ))
    }

    /// Convenience variant taking raw values: each is named `input1`,
    /// `input2`, ... positionally with its type inferred from the value.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub fn execute_values(
        &self,
        workflow_name: &str,
        values: Vec<Value>,
    ) -> Result<Vec<RuleResultTree>, EngineError> {
        let params = RuleParameter::from_values(values);
        self.execute(workflow_name, &params)
    }

    /// Expand injected workflows (single level: injected workflows
    /// contribute their own rules, not their injection targets) and compile
    /// every enabled top-level rule.
    fn compile_entry(
        &self,
        entry: &WorkflowEntry,
        params: &[RuleParameter],
    ) -> Result<CompiledRuleSet, EngineError> {
        let definition = &entry.definition;
        let mut rules: Vec<RuleDefinition> = definition.rules.clone();
        for injected_name in &definition.inject_workflows {
            let injected = self
                .cache
                .get_workflow(injected_name)
                .ok_or_else(|| EngineError::WorkflowNotFound(injected_name.clone()))?;
            rules.extend(injected.rules.iter().cloned());
        }

        let names: Vec<String> = params.iter().map(|p| p.name().to_owned()).collect();
        Ok(crate::compile::compile(&rules, &names, &self.functions)?)
    }
}

fn validate(workflow: &WorkflowDefinition) -> Result<(), EngineError> {
    let invalid = |message: String| EngineError::Validation {
        workflow: workflow.workflow_name.clone(),
        message,
    };

    if workflow.workflow_name.trim().is_empty() {
        return Err(invalid("workflow name must not be empty".to_owned()));
    }
    if workflow
        .inject_workflows
        .contains(&workflow.workflow_name)
    {
        return Err(invalid("workflow must not inject itself".to_owned()));
    }
    validate_rules(&workflow.rules, &workflow.workflow_name)
}

fn validate_rules(rules: &[RuleDefinition], workflow_name: &str) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.rule_name.trim().is_empty() {
            return Err(EngineError::Validation {
                workflow: workflow_name.to_owned(),
                message: "rule name must not be empty".to_owned(),
            });
        }
        if !seen.insert(rule.rule_name.as_str()) {
            return Err(EngineError::Validation {
                workflow: workflow_name.to_owned(),
                message: format!("duplicate rule name '{}'", rule.rule_name),
            });
        }
        validate_rules(&rule.sub_rules, workflow_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleOperator;

    fn age_workflow() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "ageCheck",
            vec![RuleDefinition::new("isAdult", "input1.age >= 18")],
        )
    }

    fn age_input(age: i64) -> Value {
        Value::from(serde_json::json!({ "age": age }))
    }

    #[test]
    fn execute_with_named_parameters() {
        let engine = RulesEngine::new();
        engine.add_workflows([age_workflow()]).unwrap();

        let params = [RuleParameter::new("input1", age_input(20))];
        let results = engine.execute("ageCheck", &params).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
    }

    #[test]
    fn execute_values_names_positionally() {
        let engine = RulesEngine::new();
        engine.add_workflows([age_workflow()]).unwrap();

        assert!(engine.execute_values("ageCheck", vec![age_input(20)]).unwrap()[0].is_success());
        assert!(!engine.execute_values("ageCheck", vec![age_input(10)]).unwrap()[0].is_success());
    }

    #[test]
    fn unknown_workflow_fails_cleanly() {
        let engine = RulesEngine::new();
        let err = engine.execute_values("doesNotExist", vec![]).unwrap_err();
        assert!(matches!(err, EngineError::WorkflowNotFound(name) if name == "doesNotExist"));
    }

    #[test]
    fn compiles_once_per_type_signature() {
        let engine = RulesEngine::new();
        engine.add_workflows([age_workflow()]).unwrap();

        engine.execute_values("ageCheck", vec![age_input(20)]).unwrap();
        engine.execute_values("ageCheck", vec![age_input(10)]).unwrap();
        assert_eq!(engine.compiled_len("ageCheck"), 1);

        // A different input shape compiles a second set.
        let wider = Value::from(serde_json::json!({ "age": 30, "name": "alice" }));
        engine
            .execute("ageCheck", &[RuleParameter::new("input1", wider)])
            .unwrap();
        assert_eq!(engine.compiled_len("ageCheck"), 2);
    }

    #[test]
    fn update_invalidates_compiled_sets() {
        let engine = RulesEngine::new();
        engine.add_workflows([age_workflow()]).unwrap();
        assert!(engine.execute_values("ageCheck", vec![age_input(20)]).unwrap()[0].is_success());

        // Raise the bar; the same input must now fail.
        engine
            .add_workflows([WorkflowDefinition::new(
                "ageCheck",
                vec![RuleDefinition::new("isAdult", "input1.age >= 21")],
            )])
            .unwrap();
        assert!(!engine.execute_values("ageCheck", vec![age_input(20)]).unwrap()[0].is_success());
    }

    #[test]
    fn remove_then_execute_fails() {
        let engine = RulesEngine::new();
        engine.add_workflows([age_workflow()]).unwrap();
        assert!(engine.remove_workflow("ageCheck"));

        let err = engine
            .execute_values("ageCheck", vec![age_input(20)])
            .unwrap_err();
        assert!(matches!(err, EngineError::WorkflowNotFound(_)));
    }

    #[test]
    fn injection_appends_rules_single_level() {
        let engine = RulesEngine::new();
        engine
            .add_workflows([
                WorkflowDefinition::new(
                    "base",
                    vec![RuleDefinition::new("positive", "input1.age > 0")],
                ),
                WorkflowDefinition::new(
                    "combined",
                    vec![RuleDefinition::new("isAdult", "input1.age >= 18")],
                )
                .with_injected(vec!["base".to_owned()]),
            ])
            .unwrap();

        let results = engine
            .execute_values("combined", vec![age_input(20)])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rule().rule_name, "isAdult");
        assert_eq!(results[1].rule().rule_name, "positive");
    }

    #[test]
    fn injecting_unknown_workflow_fails() {
        let engine = RulesEngine::new();
        engine
            .add_workflows([WorkflowDefinition::new(
                "combined",
                vec![RuleDefinition::new("isAdult", "input1.age >= 18")],
            )
            .with_injected(vec!["ghost".to_owned()])])
            .unwrap();

        let err = engine
            .execute_values("combined", vec![age_input(20)])
            .unwrap_err();
        assert!(matches!(err, EngineError::WorkflowNotFound(name) if name == "ghost"));
    }

    #[test]
    fn validation_rejects_duplicate_rule_names() {
        let engine = RulesEngine::new();
        let err = engine
            .add_workflows([WorkflowDefinition::new(
                "wf",
                vec![
                    RuleDefinition::new("a", "input1 > 0"),
                    RuleDefinition::new("a", "input1 > 1"),
                ],
            )])
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn validation_rejects_self_injection() {
        let engine = RulesEngine::new();
        let err = engine
            .add_workflows([WorkflowDefinition::new(
                "wf",
                vec![RuleDefinition::new("a", "input1 > 0")],
            )
            .with_injected(vec!["wf".to_owned()])])
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn nested_duplicate_sibling_names_rejected() {
        let engine = RulesEngine::new();
        let group = RuleDefinition::group(
            "group",
            RuleOperator::AndAlso,
            vec![
                RuleDefinition::new("x", "input1 > 0"),
                RuleDefinition::new("x", "input1 > 1"),
            ],
        );
        let err = engine
            .add_workflows([WorkflowDefinition::new("wf", vec![group])])
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn compile_error_surfaces_on_first_execute() {
        let engine = RulesEngine::new();
        engine
            .add_workflows([WorkflowDefinition::new(
                "bad",
                vec![RuleDefinition::new("broken", "undeclared > 1")],
            )])
            .unwrap();

        let err = engine.execute_values("bad", vec![age_input(1)]).unwrap_err();
        assert!(matches!(err, EngineError::Compile(_)));
        // Nothing was cached for the failed signature.
        assert_eq!(engine.compiled_len("bad"), 0);
    }
}
