//! Agent runtime: the model/tool loop behind the support chat endpoint.
//!
//! One inbound message becomes one run:
//! 1. **Seed** a transcript with the caller's text (`runtime`)
//! 2. **Call the model** through a provider adapter (`llm`, `providers`)
//! 3. **Check** each requested tool call against the catalog and run limits (`guardrails`)
//! 4. **Dispatch** the calls to the remote tool endpoint (`executor`)
//! 5. Fold results back and repeat until the model answers in plain text
//!
//! # Key Types
//!
//! - `AgentRuntime` - owns the loop and the action log
//! - `LlmClient` - provider-neutral model call returning a `ModelOutcome`
//! - `ToolCatalog` - immutable list of tools advertised to the model
//! - `ToolExecutor` - performs a named invocation and returns raw JSON

pub mod executor;
pub mod fixtures;
pub mod guardrails;
pub mod llm;
pub mod providers;
pub mod runtime;
pub mod tools;

pub use executor::{HttpToolExecutor, ToolExecutor};
pub use llm::{client_from_config, LlmClient, ModelOutcome};
pub use runtime::{AgentRuntime, DispatchMode};
pub use tools::ToolCatalog;
