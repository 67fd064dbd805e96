use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::rule::RuleDefinition;
use super::value::Value;

/// Structured output recorded by expressions via `record(key, expr)`.
///
/// One fresh carrier is passed to each top-level compiled unit per
/// invocation; its contents land on the top-level result node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutputs {
    entries: BTreeMap<String, Value>,
}

impl RuleOutputs {
    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Outcome of evaluating one rule, mirroring the rule's nesting structure.
///
/// The back-reference to the definition is a shared read-only handle; the
/// tree never outlives or mutates the definition it points to. Produced
/// fresh per evaluation call and never mutated afterwards.
#[derive(Debug, Clone)]
#[must_use]
pub struct RuleResultTree {
    rule: Arc<RuleDefinition>,
    is_success: bool,
    child_results: Vec<RuleResultTree>,
    exception_message: Option<String>,
    outputs: RuleOutputs,
}

impl RuleResultTree {
    pub(crate) fn new(
        rule: Arc<RuleDefinition>,
        is_success: bool,
        child_results: Vec<RuleResultTree>,
        exception_message: Option<String>,
    ) -> Self {
        Self {
            rule,
            is_success,
            child_results,
            exception_message,
            outputs: RuleOutputs::default(),
        }
    }

    pub(crate) fn attach_outputs(&mut self, outputs: RuleOutputs) {
        self.outputs = outputs;
    }

    /// The rule definition that produced this node.
    #[must_use]
    pub fn rule(&self) -> &RuleDefinition {
        &self.rule
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.is_success
    }

    /// Results of the sub-rules that actually ran, in evaluation order.
    /// Children skipped by short-circuiting are absent, not reported failed.
    #[must_use]
    pub fn child_results(&self) -> &[RuleResultTree] {
        &self.child_results
    }

    /// Fault text captured when evaluating the expression raised an error
    /// instead of producing a boolean.
    #[must_use]
    pub fn exception_message(&self) -> Option<&str> {
        self.exception_message.as_deref()
    }

    /// Structured output recorded during this top-level rule's evaluation.
    #[must_use]
    pub fn outputs(&self) -> &RuleOutputs {
        &self.outputs
    }

    /// The rule's success event if declared, falling back to its name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.rule
            .success_event
            .as_deref()
            .unwrap_or(&self.rule.rule_name)
    }
}

impl fmt::Display for RuleResultTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.rule.rule_name, self.is_success)
    }
}

/// Read-only combinators over a returned result list.
pub trait ResultsExt {
    /// If any top-level rule succeeded, invoke `f` once with the first
    /// winner's success event (falling back to its rule name).
    fn on_success<F: FnOnce(&str)>(&self, f: F) -> &Self;

    /// If any top-level rule failed, invoke `f` once with the failing nodes.
    fn on_fail<F: FnOnce(&[&RuleResultTree])>(&self, f: F) -> &Self;
}

impl ResultsExt for [RuleResultTree] {
    fn on_success<F: FnOnce(&str)>(&self, f: F) -> &Self {
        if let Some(winner) = self.iter().find(|r| r.is_success()) {
            f(winner.event_name());
        }
        self
    }

    fn on_fail<F: FnOnce(&[&RuleResultTree])>(&self, f: F) -> &Self {
        let failing: Vec<&RuleResultTree> = self.iter().filter(|r| !r.is_success()).collect();
        if !failing.is_empty() {
            f(&failing);
        }
        self
    }
}
