//! Provider-specific encodings of the model call.
//!
//! | Provider  | Endpoint                  | Tool requests          | Tool results                      |
//! |-----------|---------------------------|------------------------|-----------------------------------|
//! | Anthropic | `POST {base}/messages`    | `tool_use` blocks      | one `user` message, one block each |
//! | OpenAI    | `POST {base}/chat/completions` | `tool_calls` on message | one `tool` message per result   |

pub mod anthropic;
pub mod openai;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build provider HTTP client")
}

/// Reads a provider response, turning non-success statuses into errors that keep the body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await.with_context(|| format!("failed to read {provider} response"))?;

    if !status.is_success() {
        anyhow::bail!("{provider} API error {status}: {body}");
    }

    serde_json::from_str(&body).with_context(|| format!("failed to parse {provider} response"))
}
