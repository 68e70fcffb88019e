use std::sync::Arc;

use sneakerdesk_agent::AgentRuntime;
use sneakerdesk_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub agent_runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent runtime initialization failed: {0}")]
    Runtime(String),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.effective_model(),
        catalog = config.tools.catalog.as_str(),
        api_key_configured = config.llm.has_api_key(),
        "starting application bootstrap"
    );

    let agent_runtime = AgentRuntime::from_config(&config)
        .map_err(|error| BootstrapError::Runtime(format!("{error:#}")))?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        executor_url = %config.tools.executor_url,
        max_iterations = config.agent.max_iterations,
        concurrent_tool_dispatch = config.agent.concurrent_tool_dispatch,
        "agent runtime initialized"
    );

    Ok(Application { config, agent_runtime: Arc::new(agent_runtime) })
}

#[cfg(test)]
mod tests {
    use sneakerdesk_core::config::{AppConfig, CatalogProfile, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?)
    }

    fn overrides(executor_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                llm_api_key: Some("sk-test".to_string()),
                tools_executor_url: Some(executor_url.to_string()),
                tools_catalog: Some(CatalogProfile::Extended),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_on_invalid_executor_url() {
        let result = bootstrap(overrides("ftp://tools.internal"));

        let message = result.err().expect("error").to_string();
        assert!(message.contains("tools.executor_url"), "unexpected error: {message}");
    }

    #[test]
    fn bootstrap_wires_runtime_from_config() {
        let app = bootstrap(overrides("http://127.0.0.1:9/")).expect("bootstrap should succeed");

        assert_eq!(app.agent_runtime.catalog().len(), 6);
        assert_eq!(app.agent_runtime.provider_name(), app.config.llm.provider.as_str());
    }
}
