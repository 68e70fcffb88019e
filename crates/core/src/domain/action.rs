use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User-visible audit record of one tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub tool: String,
    pub input: Value,
    pub result: String,
}

/// Terminal value of one orchestration run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationOutcome {
    pub reply: String,
    pub actions: Vec<ActionLogEntry>,
}
