use serde_json::Value;
use sneakerdesk_core::config::AgentConfig;
use sneakerdesk_core::ToolInvocationRequest;

use crate::tools::ToolCatalog;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, detail: String },
}

impl GuardrailDecision {
    fn deny(reason_code: &'static str, detail: impl Into<String>) -> Self {
        Self::Deny { reason_code, detail: detail.into() }
    }
}

/// Limits applied to a single orchestration run.
///
/// `max_iterations` bounds model calls. Input validation checks each tool request
/// against its catalog descriptor before anything is dispatched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub validate_tool_input: bool,
    pub max_iterations: u32,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { validate_tool_input: true, max_iterations: 8 }
    }
}

impl GuardrailPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            validate_tool_input: config.validate_tool_input,
            max_iterations: config.max_iterations,
        }
    }

    /// Whether a tool request may still be answered after `model_calls` calls.
    pub fn allows_another_model_call(&self, model_calls: u32) -> bool {
        model_calls < self.max_iterations
    }

    pub fn evaluate(&self, catalog: &ToolCatalog, request: &ToolInvocationRequest) -> GuardrailDecision {
        if !self.validate_tool_input {
            return GuardrailDecision::Allow;
        }

        let Some(descriptor) = catalog.get(&request.name) else {
            return GuardrailDecision::deny(
                "unknown_tool",
                format!("`{}` is not in the {} catalog", request.name, catalog.profile().as_str()),
            );
        };

        let Value::Object(fields) = &request.input else {
            return GuardrailDecision::deny("input_not_object", "tool input must be a JSON object");
        };

        if let Some(missing) = descriptor.required.iter().find(|name| !fields.contains_key(*name)) {
            return GuardrailDecision::deny(
                "missing_required_field",
                format!("required field `{missing}` is absent"),
            );
        }

        for (name, value) in fields {
            let Some(parameter) = descriptor.parameter(name) else {
                continue;
            };
            if !parameter.kind.matches(value) {
                return GuardrailDecision::deny(
                    "parameter_type_mismatch",
                    format!("field `{name}` must be a {}", parameter.kind.as_str()),
                );
            }
        }

        GuardrailDecision::Allow
    }
}
