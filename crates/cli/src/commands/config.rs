use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use sneakerdesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key_envs = ["SNEAKERDESK_LLM_API_KEY", config.llm.provider.api_key_env()];
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries: Vec<(&str, String, Vec<&str>)> = vec![
        ("llm.provider", config.llm.provider.as_str().to_string(), vec!["SNEAKERDESK_LLM_PROVIDER"]),
        ("llm.model", config.llm.effective_model(), vec!["SNEAKERDESK_LLM_MODEL"]),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| {
                format!("<unset> (using {})", config.llm.effective_base_url())
            }),
            vec!["SNEAKERDESK_LLM_BASE_URL"],
        ),
        ("llm.api_key", api_key, api_key_envs.to_vec()),
        ("llm.max_tokens", config.llm.max_tokens.to_string(), vec!["SNEAKERDESK_LLM_MAX_TOKENS"]),
        (
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            vec!["SNEAKERDESK_LLM_TIMEOUT_SECS"],
        ),
        (
            "tools.executor_url",
            config.tools.executor_url.clone(),
            vec!["SNEAKERDESK_TOOLS_EXECUTOR_URL", "MCP_SERVER_URL"],
        ),
        (
            "tools.timeout_secs",
            config.tools.timeout_secs.to_string(),
            vec!["SNEAKERDESK_TOOLS_TIMEOUT_SECS"],
        ),
        (
            "tools.catalog",
            config.tools.catalog.as_str().to_string(),
            vec!["SNEAKERDESK_TOOLS_CATALOG"],
        ),
        (
            "agent.max_iterations",
            config.agent.max_iterations.to_string(),
            vec!["SNEAKERDESK_AGENT_MAX_ITERATIONS"],
        ),
        (
            "agent.validate_tool_input",
            config.agent.validate_tool_input.to_string(),
            vec!["SNEAKERDESK_AGENT_VALIDATE_TOOL_INPUT"],
        ),
        (
            "agent.concurrent_tool_dispatch",
            config.agent.concurrent_tool_dispatch.to_string(),
            vec!["SNEAKERDESK_AGENT_CONCURRENT_TOOL_DISPATCH"],
        ),
        (
            "agent.system_directive",
            format!("<{} chars>", config.agent.system_directive.chars().count()),
            vec!["SNEAKERDESK_AGENT_SYSTEM_DIRECTIVE"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            vec!["SNEAKERDESK_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), vec!["SNEAKERDESK_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            vec!["SNEAKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            vec!["SNEAKERDESK_LOGGING_LEVEL", "SNEAKERDESK_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            vec!["SNEAKERDESK_LOGGING_FORMAT", "SNEAKERDESK_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|(key, value, env_keys)| render_line(key, value, source(*key, env_keys.as_slice()))),
    );
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
