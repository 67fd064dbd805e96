use super::value::{TypeSignature, Value};

/// One named, typed input to an `execute` call.
///
/// The signature is captured at construction from the value's shape; only
/// the ordered signatures of a call's parameters contribute to the
/// compiled-set cache key. Parameters themselves are transient and never
/// cached.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleParameter {
    name: String,
    signature: TypeSignature,
    value: Value,
}

impl RuleParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            signature: value.signature(),
            value,
        }
    }

    /// Name positional inputs `input1`, `input2`, ... in order, inferring
    /// each signature from the runtime value.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Vec<RuleParameter> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| RuleParameter::new(format!("input{}", i + 1), value))
            .collect()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn signature(&self) -> &TypeSignature {
        &self.signature
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}
