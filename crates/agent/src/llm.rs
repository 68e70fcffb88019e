use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sneakerdesk_core::config::{LlmConfig, LlmProvider};
use sneakerdesk_core::{ToolInvocationRequest, Transcript};

use crate::providers::{AnthropicClient, OpenAiClient};
use crate::tools::ToolCatalog;

/// What the model decided to do with one turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelOutcome {
    FinalAnswer { text: String },
    ToolRequests { text: Option<String>, requests: Vec<ToolInvocationRequest> },
}

impl ModelOutcome {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

/// One request/response cycle with an LLM provider.
///
/// Implementations own their wire encoding: the transcript, directive and catalog go
/// in, a provider-neutral [`ModelOutcome`] comes out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn complete_turn(
        &self,
        transcript: &Transcript,
        system_directive: &str,
        catalog: &ToolCatalog,
    ) -> Result<ModelOutcome>;
}

pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicClient::from_config(config)?),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
    };
    Ok(client)
}
