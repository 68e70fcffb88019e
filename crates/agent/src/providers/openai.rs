//! OpenAI Chat Completions adapter.
//!
//! The directive is sent as the leading `system` message. Tool requests are
//! `tool_calls` on the assistant message with `function.arguments` as a JSON string;
//! each result is its own `role: "tool"` message keyed by `tool_call_id`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sneakerdesk_core::config::LlmConfig;
use sneakerdesk_core::{CorrelationId, ToolInvocationRequest, Transcript, Turn};
use tracing::debug;

use crate::llm::{LlmClient, ModelOutcome};
use crate::providers::{http_client, read_json};
use crate::tools::ToolCatalog;

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_calls: Vec::new(), tool_call_id: None }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunction,
}

#[derive(Debug, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

fn function_kind() -> String {
    "function".to_string()
}

pub fn encode_request(
    model: &str,
    max_tokens: u32,
    transcript: &Transcript,
    system_directive: &str,
    catalog: &ToolCatalog,
) -> ChatCompletionRequest {
    let mut messages = vec![WireMessage::text("system", system_directive)];

    for turn in transcript.turns() {
        match turn {
            Turn::User { text } => messages.push(WireMessage::text("user", text.clone())),
            Turn::AssistantText { text } => {
                messages.push(WireMessage::text("assistant", text.clone()))
            }
            Turn::ToolRequests { text, requests } => messages.push(WireMessage {
                role: "assistant",
                content: text.clone(),
                tool_calls: requests
                    .iter()
                    .map(|request| WireToolCall {
                        id: request.id.as_str().to_string(),
                        kind: function_kind(),
                        function: WireFunctionCall {
                            name: request.name.clone(),
                            arguments: request.input.to_string(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
            }),
            Turn::ToolResults { results } => {
                messages.extend(results.iter().map(|result| WireMessage {
                    role: "tool",
                    content: Some(result.output.clone()),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(result.id.as_str().to_string()),
                }))
            }
        }
    }

    let tools = catalog
        .descriptors()
        .iter()
        .map(|descriptor| WireTool {
            kind: "function",
            function: WireFunction {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                parameters: descriptor.input_schema(),
            },
        })
        .collect();

    ChatCompletionRequest { model: model.to_string(), max_tokens, messages, tools }
}

pub fn decode_response(response: ChatCompletionResponse) -> Result<ModelOutcome> {
    let choice = response.choices.into_iter().next().context("response contained no choices")?;
    let message = choice.message;
    let tool_calls = message.tool_calls.unwrap_or_default();

    if tool_calls.is_empty() {
        return Ok(ModelOutcome::FinalAnswer { text: message.content.unwrap_or_default() });
    }

    let mut requests = Vec::with_capacity(tool_calls.len());
    for call in tool_calls {
        let input = parse_arguments(&call.function.arguments).with_context(|| {
            format!("tool call `{}` for `{}` had unusable arguments", call.id, call.function.name)
        })?;
        requests.push(ToolInvocationRequest {
            id: CorrelationId(call.id),
            name: call.function.name,
            input,
        });
    }

    Ok(ModelOutcome::ToolRequests {
        text: message.content.filter(|text| !text.is_empty()),
        requests,
    })
}

fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value: Value = serde_json::from_str(raw).context("arguments are not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("arguments must be a JSON object");
    }
    Ok(value)
}

pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().context("llm.api_key is not configured")?;
        Self::new(
            config.effective_base_url(),
            api_key,
            config.effective_model(),
            config.max_tokens,
            config.timeout_secs,
        )
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    async fn complete_turn(
        &self,
        transcript: &Transcript,
        system_directive: &str,
        catalog: &ToolCatalog,
    ) -> Result<ModelOutcome> {
        let request =
            encode_request(&self.model, self.max_tokens, transcript, system_directive, catalog);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending openai chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("failed to send openai request")?;

        let body: ChatCompletionResponse = read_json("openai", response).await?;
        decode_response(body)
    }
}
