//! In-memory doubles for the model client and tool executor.
//!
//! Used by this crate's tests and by the server and CLI crates to drive the
//! orchestration loop without network access.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use sneakerdesk_core::{CorrelationId, ToolInvocationRequest, Transcript};

use crate::executor::ToolExecutor;
use crate::llm::{LlmClient, ModelOutcome};
use crate::tools::ToolCatalog;

pub fn tool_request(id: &str, name: &str, input: Value) -> ToolInvocationRequest {
    ToolInvocationRequest { id: CorrelationId(id.to_string()), name: name.to_string(), input }
}

/// Replays a fixed sequence of model outcomes and records every transcript it was shown.
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<ModelOutcome, String>>>,
    seen: Mutex<Vec<Transcript>>,
}

impl ScriptedLlmClient {
    pub fn new(outcomes: impl IntoIterator<Item = ModelOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().map(Ok).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new([ModelOutcome::FinalAnswer { text: text.to_string() }])
    }

    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(message.to_string())])),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_transcripts(&self) -> Vec<Transcript> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    async fn complete_turn(
        &self,
        transcript: &Transcript,
        _system_directive: &str,
        _catalog: &ToolCatalog,
    ) -> Result<ModelOutcome> {
        self.seen
            .lock()
            .map_err(|_| anyhow!("scripted client lock poisoned"))?
            .push(transcript.clone());

        let next = self
            .script
            .lock()
            .map_err(|_| anyhow!("scripted client lock poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("scripted client ran out of outcomes"))?;

        next.map_err(|message| anyhow!(message))
    }
}

#[derive(Clone)]
enum Canned {
    Reply(Value),
    Fail(String),
}

/// Tool executor that answers from canned responses and records each invocation.
#[derive(Default)]
pub struct RecordingExecutor {
    responses: HashMap<String, Canned>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, tool: &str, response: Value) -> Self {
        self.responses.insert(tool.to_string(), Canned::Reply(response));
        self
    }

    pub fn with_failure(mut self, tool: &str, message: &str) -> Self {
        self.responses.insert(tool.to_string(), Canned::Fail(message.to_string()));
        self
    }

    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    /// Invocations in completion order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn invoke(&self, name: &str, input: &Value) -> Result<Value> {
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }

        self.calls
            .lock()
            .map_err(|_| anyhow!("recording executor lock poisoned"))?
            .push((name.to_string(), input.clone()));

        match self.responses.get(name) {
            Some(Canned::Reply(value)) => Ok(value.clone()),
            Some(Canned::Fail(message)) => Err(anyhow!(message.clone())),
            None => Ok(Value::Null),
        }
    }
}
