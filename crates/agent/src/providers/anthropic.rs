//! Anthropic Messages API adapter.
//!
//! - Endpoint: `POST {base_url}/messages`
//! - Headers: `x-api-key`, `anthropic-version: 2023-06-01`
//! - Tool requests arrive as `tool_use` content blocks when `stop_reason == "tool_use"`.
//! - Tool results go back as one `user` message holding a `tool_result` block per request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sneakerdesk_core::config::LlmConfig;
use sneakerdesk_core::{CorrelationId, ToolInvocationRequest, Transcript, Turn};
use tracing::debug;

use crate::llm::{LlmClient, ModelOutcome};
use crate::providers::{http_client, read_json};
use crate::tools::ToolCatalog;

pub const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
pub struct WireTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

pub fn encode_request(
    model: &str,
    max_tokens: u32,
    transcript: &Transcript,
    system_directive: &str,
    catalog: &ToolCatalog,
) -> MessagesRequest {
    let messages = transcript
        .turns()
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => {
                WireMessage { role: "user", content: WireContent::Text(text.clone()) }
            }
            Turn::AssistantText { text } => {
                WireMessage { role: "assistant", content: WireContent::Text(text.clone()) }
            }
            Turn::ToolRequests { text, requests } => {
                let mut blocks = Vec::with_capacity(requests.len() + 1);
                if let Some(text) = text.as_ref().filter(|text| !text.is_empty()) {
                    blocks.push(ContentBlock::Text { text: text.clone() });
                }
                blocks.extend(requests.iter().map(|request| ContentBlock::ToolUse {
                    id: request.id.as_str().to_string(),
                    name: request.name.clone(),
                    input: request.input.clone(),
                }));
                WireMessage { role: "assistant", content: WireContent::Blocks(blocks) }
            }
            Turn::ToolResults { results } => WireMessage {
                role: "user",
                content: WireContent::Blocks(
                    results
                        .iter()
                        .map(|result| ContentBlock::ToolResult {
                            tool_use_id: result.id.as_str().to_string(),
                            content: result.output.clone(),
                        })
                        .collect(),
                ),
            },
        })
        .collect();

    let tools = catalog
        .descriptors()
        .iter()
        .map(|descriptor| WireTool {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
        })
        .collect();

    MessagesRequest {
        model: model.to_string(),
        max_tokens,
        system: system_directive.to_string(),
        messages,
        tools,
    }
}

pub fn decode_response(response: MessagesResponse) -> Result<ModelOutcome> {
    if response.stop_reason.as_deref() != Some("tool_use") {
        let text = response
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                _ => None,
            })
            .unwrap_or_default();
        return Ok(ModelOutcome::FinalAnswer { text });
    }

    // Text blocks are joined into one preamble, which encode_request replays ahead of the
    // tool_use blocks. Interleaving of text between tool_use blocks is not kept.
    let mut preamble = String::new();
    let mut requests = Vec::new();
    for block in response.content {
        match block {
            ResponseBlock::Text { text } => preamble.push_str(&text),
            ResponseBlock::ToolUse { id, name, input } => {
                if !input.is_object() {
                    anyhow::bail!("tool_use block `{id}` for `{name}` carried a non-object input");
                }
                requests.push(ToolInvocationRequest { id: CorrelationId(id), name, input });
            }
            ResponseBlock::Other => {}
        }
    }

    if requests.is_empty() {
        anyhow::bail!("stop_reason was tool_use but the response held no tool_use blocks");
    }

    Ok(ModelOutcome::ToolRequests {
        text: (!preamble.is_empty()).then_some(preamble),
        requests,
    })
}

pub struct AnthropicClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
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
impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &'static str {
        "anthropic"
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
            "sending anthropic messages request"
        );

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("failed to send anthropic request")?;

        let body: MessagesResponse = read_json("anthropic", response).await?;
        decode_response(body)
    }
}
