use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use super::Action;
use crate::config_file::ActionDescriptor;
use crate::context::ExecutionContext;
use crate::executor::ActionExecutor;
use crate::expression::evaluate_condition;

fn default_expression() -> Value {
    Value::Bool(true)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionParams {
    /// Expression source; YAML may also hand over a bare bool or number
    #[serde(default = "default_expression")]
    pub expression: Value,

    #[serde(default)]
    pub if_true: Vec<ActionDescriptor>,

    #[serde(default)]
    pub if_false: Vec<ActionDescriptor>,
}

/// Run `if_true` or `if_false` depending on an expression.
///
/// An expression that cannot be parsed or evaluated counts as false. The
/// chosen branch stops at its first failing step and fails this step with it.
pub struct ConditionAction {
    name: String,
    params: ConditionParams,
}

impl ConditionAction {
    pub fn new(name: String, params: ConditionParams) -> Self {
        Self { name, params }
    }
}

/// Expression text of a scalar parameter, `None` for lists, maps and null.
fn expression_source(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Action for ConditionAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let expression = expression_source(&self.params.expression).unwrap_or_default();
        let outcome = if expression.is_empty() {
            error!(action = %self.name, "Expression {} is not a condition", self.params.expression);
            false
        } else {
            evaluate_condition(&expression, ctx.variables()).unwrap_or_else(|e| {
                error!(action = %self.name, "Failed to evaluate '{}': {}", expression, e);
                false
            })
        };
        info!(action = %self.name, "Condition '{}' is {}", expression, outcome);

        let branch = if outcome {
            &self.params.if_true
        } else {
            &self.params.if_false
        };
        if branch.is_empty() {
            info!(action = %self.name, "No steps to run for this branch");
            return Ok(());
        }

        if !executor.execute_sequence(branch, ctx) {
            bail!("A step of the {} branch failed", if outcome { "if_true" } else { "if_false" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_source_from_scalars() {
        assert_eq!(expression_source(&json!("x > 3")).as_deref(), Some("x > 3"));
        assert_eq!(expression_source(&json!(true)).as_deref(), Some("True"));
        assert_eq!(expression_source(&json!(false)).as_deref(), Some("False"));
        assert_eq!(expression_source(&json!(1)).as_deref(), Some("1"));
        assert_eq!(expression_source(&json!(0.5)).as_deref(), Some("0.5"));
        assert_eq!(expression_source(&json!(null)), None);
        assert_eq!(expression_source(&json!(["x"])), None);
    }

    #[test]
    fn test_params_accept_non_string_expression() {
        let params: ConditionParams =
            serde_json::from_value(json!({"expression": true, "if_true": [{"type": "wait"}]}))
                .unwrap();
        assert_eq!(params.expression, json!(true));
        assert_eq!(params.if_true.len(), 1);
        assert!(params.if_false.is_empty());

        let defaulted: ConditionParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(expression_source(&defaulted.expression).as_deref(), Some("True"));
    }
}
