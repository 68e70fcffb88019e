use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sneakerdesk_core::config::ToolsConfig;
use tracing::debug;

/// Performs a named tool invocation against the backend.
///
/// The returned JSON is passed through untouched; interpreting it is the model's job.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(&self, name: &str, input: &Value) -> Result<Value>;
}

#[derive(Serialize)]
struct InvocationBody<'a> {
    tool: &'a str,
    input: &'a Value,
}

/// Client for the remote tool-execution endpoint (`POST {base}/tool`).
#[derive(Clone, Debug)]
pub struct HttpToolExecutor {
    client: Client,
    base_url: String,
}

impl HttpToolExecutor {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build tool executor HTTP client")?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &ToolsConfig) -> Result<Self> {
        Self::new(config.executor_url.clone(), config.timeout_secs)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/tool", self.base_url)
    }

    /// Checks that the executor host answers HTTP at all; any status counts as reachable.
    pub async fn probe(&self) -> Result<u16> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .with_context(|| format!("tool executor at {} is unreachable", self.base_url))?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn invoke(&self, name: &str, input: &Value) -> Result<Value> {
        let endpoint = self.endpoint();
        debug!(tool = name, endpoint = %endpoint, "posting tool invocation");

        let response = self
            .client
            .post(&endpoint)
            .json(&InvocationBody { tool: name, input })
            .send()
            .await
            .with_context(|| format!("tool endpoint request to {endpoint} failed"))?;

        let status = response.status();
        let body = response.text().await.context("failed to read tool endpoint response")?;
        if !status.is_success() {
            anyhow::bail!("tool endpoint returned {status}: {body}");
        }

        serde_json::from_str(&body).context("tool endpoint returned a non-JSON body")
    }
}
