use serde::{Deserialize, Serialize};

use super::rule::RuleDefinition;

/// A named, ordered collection of rules evaluated together against one set
/// of typed inputs.
///
/// `inject_workflows` names other registered workflows whose rule lists are
/// appended to this one at compilation time (single-level: an injected
/// workflow contributes its own rules, not its own injection targets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow_name: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub inject_workflows: Vec<String>,
}

impl WorkflowDefinition {
    #[must_use]
    pub fn new(workflow_name: impl Into<String>, rules: Vec<RuleDefinition>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            rules,
            inject_workflows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_injected(mut self, names: Vec<String>) -> Self {
        self.inject_workflows = names;
        self
    }
}
