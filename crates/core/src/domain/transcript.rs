use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

/// Opaque token linking a tool request to its result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub id: CorrelationId,
    pub name: String,
    pub input: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub id: CorrelationId,
    pub output: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    AssistantText { text: String },
    ToolRequests { text: Option<String>, requests: Vec<ToolInvocationRequest> },
    ToolResults { results: Vec<ToolInvocationResult> },
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::AssistantText { .. } | Self::ToolRequests { .. } => Role::Assistant,
            Self::ToolResults { .. } => Role::ToolResult,
        }
    }
}

/// Append-only conversation history for a single orchestration run.
///
/// A `ToolRequests` turn leaves the transcript pending until a `ToolResults` turn
/// answers every correlation token it issued. Only a consistent transcript may be
/// sent to the model.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn seeded(user_text: impl Into<String>) -> Self {
        Self { turns: vec![Turn::User { text: user_text.into() }] }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn pending_requests(&self) -> Option<&[ToolInvocationRequest]> {
        match self.turns.last() {
            Some(Turn::ToolRequests { requests, .. }) => Some(requests),
            _ => None,
        }
    }

    pub fn ensure_consistent(&self) -> Result<(), DomainError> {
        match self.pending_requests() {
            Some(requests) => Err(DomainError::TranscriptInconsistent(format!(
                "{} tool request(s) are awaiting results",
                requests.len()
            ))),
            None => Ok(()),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_consistent()?;
        self.turns.push(Turn::User { text: text.into() });
        Ok(())
    }

    pub fn push_assistant_text(&mut self, text: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_consistent()?;
        self.turns.push(Turn::AssistantText { text: text.into() });
        Ok(())
    }

    pub fn push_tool_requests(
        &mut self,
        text: Option<String>,
        requests: Vec<ToolInvocationRequest>,
    ) -> Result<(), DomainError> {
        self.ensure_consistent()?;
        if requests.is_empty() {
            return Err(DomainError::TranscriptInconsistent(
                "a tool request turn must carry at least one request".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for request in &requests {
            if !seen.insert(&request.id) {
                return Err(DomainError::TranscriptInconsistent(format!(
                    "duplicate correlation token `{}` in one turn",
                    request.id.as_str()
                )));
            }
        }

        self.turns.push(Turn::ToolRequests { text, requests });
        Ok(())
    }

    pub fn push_tool_results(
        &mut self,
        results: Vec<ToolInvocationResult>,
    ) -> Result<(), DomainError> {
        let pending = self.pending_requests().ok_or_else(|| {
            DomainError::TranscriptInconsistent(
                "tool results supplied without a pending request turn".to_string(),
            )
        })?;

        let expected: BTreeSet<&CorrelationId> = pending.iter().map(|request| &request.id).collect();
        let supplied: BTreeSet<&CorrelationId> = results.iter().map(|result| &result.id).collect();
        if results.len() != pending.len() || expected != supplied {
            return Err(DomainError::TranscriptInconsistent(format!(
                "expected results for {} request(s) with matching tokens, got {}",
                pending.len(),
                results.len()
            )));
        }

        self.turns.push(Turn::ToolResults { results });
        Ok(())
    }
}
