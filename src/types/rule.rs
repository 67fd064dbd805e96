use serde::{Deserialize, Serialize};

/// How a composite rule combines the outcomes of its `sub_rules`.
///
/// `None` marks a leaf rule evaluated from its expression alone; a composite
/// rule must declare `AndAlso` or `OrElse`, both of which short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleOperator {
    #[default]
    None,
    AndAlso,
    OrElse,
}

/// Which expression dialect compiles a rule's expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpressionType {
    /// The expression is evaluated directly against the named inputs.
    #[default]
    Direct,
    /// The expression may additionally reference `local_params`, each
    /// compiled as a sub-expression and bound as a named local.
    ScopedLambda,
}

/// A named sub-expression evaluated before the owning rule's expression and
/// exposed to it (and to descendant rules) as an additional named value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalParam {
    pub name: String,
    pub expression: String,
}

/// One rule of a workflow: either a leaf backed by an expression, or a
/// composite grouping `sub_rules` under a boolean operator.
///
/// Definitions arrive already parsed from an external loader; this crate
/// only derives the serde traits so such a loader can produce them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub rule_name: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub operator: RuleOperator,
    #[serde(default)]
    pub sub_rules: Vec<RuleDefinition>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub success_event: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub expression_type: ExpressionType,
    #[serde(default)]
    pub local_params: Vec<LocalParam>,
}

fn default_enabled() -> bool {
    true
}

impl RuleDefinition {
    /// A leaf rule evaluated from `expression` with default settings.
    #[must_use]
    pub fn new(rule_name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            expression: expression.into(),
            operator: RuleOperator::None,
            sub_rules: Vec::new(),
            enabled: true,
            success_event: None,
            error_message: None,
            expression_type: ExpressionType::Direct,
            local_params: Vec::new(),
        }
    }

    /// A composite rule combining `sub_rules` with the given operator.
    #[must_use]
    pub fn group(
        rule_name: impl Into<String>,
        operator: RuleOperator,
        sub_rules: Vec<RuleDefinition>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            expression: String::new(),
            operator,
            sub_rules,
            enabled: true,
            success_event: None,
            error_message: None,
            expression_type: ExpressionType::Direct,
            local_params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_success_event(mut self, event: impl Into<String>) -> Self {
        self.success_event = Some(event.into());
        self
    }

    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_local_params(mut self, locals: Vec<LocalParam>) -> Self {
        self.expression_type = ExpressionType::ScopedLambda;
        self.local_params = locals;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
