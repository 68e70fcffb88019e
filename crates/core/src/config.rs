use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SYSTEM_DIRECTIVE: &str = "You are an AI customer support agent for SneakerHub shoe store.
You have access to powerful tools to help customers.
Always try to fulfill any customer request using your available tools.
Be as helpful as possible and execute what customers ask.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ToolsConfig {
    pub executor_url: String,
    pub timeout_secs: u64,
    pub catalog: CatalogProfile,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub validate_tool_input: bool,
    pub concurrent_tool_dispatch: bool,
    pub system_directive: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogProfile {
    Storefront,
    Extended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub tools_executor_url: Option<String>,
    pub tools_catalog: Option<CatalogProfile>,
    pub agent_max_iterations: Option<u32>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: None,
                max_tokens: 1024,
                timeout_secs: 60,
            },
            tools: ToolsConfig {
                executor_url: String::new(),
                timeout_secs: 30,
                catalog: CatalogProfile::Storefront,
            },
            agent: AgentConfig {
                max_iterations: 8,
                validate_tool_input: true,
                concurrent_tool_dispatch: false,
                system_directive: DEFAULT_SYSTEM_DIRECTIVE.to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-6",
            Self::OpenAi => "gpt-4o",
        }
    }

    /// Provider-native variable consulted when no explicit api key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl CatalogProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storefront => "storefront",
            Self::Extended => "extended",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected anthropic|openai)"
            ))),
        }
    }
}

impl std::str::FromStr for CatalogProfile {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "storefront" => Ok(Self::Storefront),
            "extended" => Ok(Self::Extended),
            other => Err(ConfigError::Validation(format!(
                "unsupported tool catalog `{other}` (expected storefront|extended)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// Configured base URL, or the provider's public endpoint, without a trailing slash.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Configured model, or the provider's default when none was set.
    pub fn effective_model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
            .to_string()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("sneakerdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.apply_provider_key_fallback();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = Some(model);
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(tools) = patch.tools {
            if let Some(executor_url) = tools.executor_url {
                self.tools.executor_url = executor_url;
            }
            if let Some(timeout_secs) = tools.timeout_secs {
                self.tools.timeout_secs = timeout_secs;
            }
            if let Some(catalog) = tools.catalog {
                self.tools.catalog = catalog;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
            if let Some(validate_tool_input) = agent.validate_tool_input {
                self.agent.validate_tool_input = validate_tool_input;
            }
            if let Some(concurrent_tool_dispatch) = agent.concurrent_tool_dispatch {
                self.agent.concurrent_tool_dispatch = concurrent_tool_dispatch;
            }
            if let Some(system_directive) = agent.system_directive {
                self.agent.system_directive = system_directive;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SNEAKERDESK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SNEAKERDESK_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SNEAKERDESK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SNEAKERDESK_LLM_MODEL") {
            self.llm.model = Some(value);
        }
        if let Some(value) = read_env("SNEAKERDESK_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("SNEAKERDESK_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("SNEAKERDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SNEAKERDESK_LLM_TIMEOUT_SECS", &value)?;
        }

        let executor_url =
            read_env("SNEAKERDESK_TOOLS_EXECUTOR_URL").or_else(|| read_env("MCP_SERVER_URL"));
        if let Some(value) = executor_url {
            self.tools.executor_url = value;
        }
        if let Some(value) = read_env("SNEAKERDESK_TOOLS_TIMEOUT_SECS") {
            self.tools.timeout_secs = parse_u64("SNEAKERDESK_TOOLS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SNEAKERDESK_TOOLS_CATALOG") {
            self.tools.catalog = value.parse()?;
        }

        if let Some(value) = read_env("SNEAKERDESK_AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_u32("SNEAKERDESK_AGENT_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("SNEAKERDESK_AGENT_VALIDATE_TOOL_INPUT") {
            self.agent.validate_tool_input =
                parse_bool("SNEAKERDESK_AGENT_VALIDATE_TOOL_INPUT", &value)?;
        }
        if let Some(value) = read_env("SNEAKERDESK_AGENT_CONCURRENT_TOOL_DISPATCH") {
            self.agent.concurrent_tool_dispatch =
                parse_bool("SNEAKERDESK_AGENT_CONCURRENT_TOOL_DISPATCH", &value)?;
        }
        if let Some(value) = read_env("SNEAKERDESK_AGENT_SYSTEM_DIRECTIVE") {
            self.agent.system_directive = value;
        }

        if let Some(value) = read_env("SNEAKERDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SNEAKERDESK_SERVER_PORT") {
            self.server.port = parse_u16("SNEAKERDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SNEAKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SNEAKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SNEAKERDESK_LOGGING_LEVEL").or_else(|| read_env("SNEAKERDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SNEAKERDESK_LOGGING_FORMAT").or_else(|| read_env("SNEAKERDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = Some(llm_model);
        }
        if let Some(executor_url) = overrides.tools_executor_url {
            self.tools.executor_url = executor_url;
        }
        if let Some(catalog) = overrides.tools_catalog {
            self.tools.catalog = catalog;
        }
        if let Some(max_iterations) = overrides.agent_max_iterations {
            self.agent.max_iterations = max_iterations;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    // Runs last so the provider-native variable matches the final provider choice.
    fn apply_provider_key_fallback(&mut self) {
        if self.llm.has_api_key() {
            return;
        }
        if let Some(value) = read_env(self.llm.provider.api_key_env()) {
            self.llm.api_key = Some(secret_value(value));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_tools(&self.tools)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("sneakerdesk.toml"), PathBuf::from("config/sneakerdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.as_deref().is_some_and(|model| model.trim().is_empty()) {
        return Err(ConfigError::Validation("llm.model must not be empty when set".to_string()));
    }

    if !llm.has_api_key() {
        return Err(ConfigError::Validation(format!(
            "llm.api_key is required for the {} provider (set SNEAKERDESK_LLM_API_KEY or {})",
            llm.provider.as_str(),
            llm.provider.api_key_env()
        )));
    }

    if let Some(base_url) = &llm.base_url {
        if !is_http_url(base_url.trim()) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_tools(tools: &ToolsConfig) -> Result<(), ConfigError> {
    let url = tools.executor_url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "tools.executor_url is required (set SNEAKERDESK_TOOLS_EXECUTOR_URL or MCP_SERVER_URL)"
                .to_string(),
        ));
    }
    if !is_http_url(url) {
        return Err(ConfigError::Validation(
            "tools.executor_url must start with http:// or https://".to_string(),
        ));
    }

    if tools.timeout_secs == 0 || tools.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "tools.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_iterations == 0 || agent.max_iterations > 64 {
        return Err(ConfigError::Validation(
            "agent.max_iterations must be in range 1..=64".to_string(),
        ));
    }

    if agent.system_directive.trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.system_directive must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    tools: Option<ToolsPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolsPatch {
    executor_url: Option<String>,
    timeout_secs: Option<u64>,
    catalog: Option<CatalogProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_iterations: Option<u32>,
    validate_tool_input: Option<bool>,
    concurrent_tool_dispatch: Option<bool>,
    system_directive: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

/// Every variable `AppConfig::load` consults. Tests use it to isolate the environment.
pub const CONFIG_ENV_KEYS: &[&str] = &[
    "SNEAKERDESK_LLM_PROVIDER",
    "SNEAKERDESK_LLM_API_KEY",
    "SNEAKERDESK_LLM_BASE_URL",
    "SNEAKERDESK_LLM_MODEL",
    "SNEAKERDESK_LLM_MAX_TOKENS",
    "SNEAKERDESK_LLM_TIMEOUT_SECS",
    "SNEAKERDESK_TOOLS_EXECUTOR_URL",
    "SNEAKERDESK_TOOLS_TIMEOUT_SECS",
    "SNEAKERDESK_TOOLS_CATALOG",
    "SNEAKERDESK_AGENT_MAX_ITERATIONS",
    "SNEAKERDESK_AGENT_VALIDATE_TOOL_INPUT",
    "SNEAKERDESK_AGENT_CONCURRENT_TOOL_DISPATCH",
    "SNEAKERDESK_AGENT_SYSTEM_DIRECTIVE",
    "SNEAKERDESK_SERVER_BIND_ADDRESS",
    "SNEAKERDESK_SERVER_PORT",
    "SNEAKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "SNEAKERDESK_LOGGING_LEVEL",
    "SNEAKERDESK_LOGGING_FORMAT",
    "SNEAKERDESK_LOG_LEVEL",
    "SNEAKERDESK_LOG_FORMAT",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "MCP_SERVER_URL",
];

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, CatalogProfile, ConfigError, ConfigOverrides, LlmProvider, LoadOptions,
        LogFormat, CONFIG_ENV_KEYS,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in CONFIG_ENV_KEYS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn with_vars(
        vars: &[(&str, &str)],
        test_fn: impl FnOnce() -> Result<(), String>,
    ) -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = test_fn();
        for (key, _) in vars {
            env::remove_var(key);
        }
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        with_vars(&[("TEST_SNEAKERDESK_KEY", "sk-from-env")], || {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sneakerdesk.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_SNEAKERDESK_KEY}"

[tools]
executor_url = "http://localhost:4000"
catalog = "extended"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(
                config.tools.catalog == CatalogProfile::Extended,
                "catalog profile should be read from file",
            )
        })
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_API_KEY", "sk-test"),
                ("SNEAKERDESK_TOOLS_EXECUTOR_URL", "http://localhost:4000"),
                ("SNEAKERDESK_LOG_LEVEL", "warn"),
                ("SNEAKERDESK_LOG_FORMAT", "pretty"),
            ],
            || {
                let config = AppConfig::load(LoadOptions::default())
                    .map_err(|err| format!("config load failed: {err}"))?;

                ensure(config.logging.level == "warn", "log level should be set from env var")?;
                ensure(
                    matches!(config.logging.format, LogFormat::Pretty),
                    "pretty logging format should be set from env var",
                )
            },
        )
    }

    #[test]
    fn provider_native_variables_are_used_as_fallbacks() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_PROVIDER", "openai"),
                ("OPENAI_API_KEY", "sk-openai"),
                ("ANTHROPIC_API_KEY", "sk-anthropic"),
                ("MCP_SERVER_URL", "http://mcp.internal:9000"),
            ],
            || {
                let config = AppConfig::load(LoadOptions::default())
                    .map_err(|err| format!("config load failed: {err}"))?;

                ensure(config.llm.provider == LlmProvider::OpenAi, "provider should be openai")?;
                ensure(
                    config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-openai")
                        == Some(true),
                    "openai provider should pick OPENAI_API_KEY",
                )?;
                ensure(
                    config.tools.executor_url == "http://mcp.internal:9000",
                    "MCP_SERVER_URL should populate the executor url",
                )?;
                ensure(
                    config.llm.effective_base_url() == "https://api.openai.com/v1",
                    "base url should default to the provider endpoint",
                )
            },
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_API_KEY", "sk-from-env"),
                ("SNEAKERDESK_TOOLS_EXECUTOR_URL", "http://from-env:4000"),
                ("SNEAKERDESK_AGENT_MAX_ITERATIONS", "5"),
            ],
            || {
                let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
                let path = dir.path().join("sneakerdesk.toml");
                fs::write(
                    &path,
                    r#"
[llm]
api_key = "sk-from-file"
model = "claude-from-file"

[tools]
executor_url = "http://from-file:4000"

[agent]
max_iterations = 3
concurrent_tool_dispatch = true

[logging]
level = "warn"
"#,
                )
                .map_err(|err| err.to_string())?;

                let config = AppConfig::load(LoadOptions {
                    config_path: Some(path),
                    overrides: ConfigOverrides {
                        tools_executor_url: Some("http://from-override:4000".to_string()),
                        log_level: Some("debug".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
                .map_err(|err| format!("config load failed: {err}"))?;

                ensure(
                    config.tools.executor_url == "http://from-override:4000",
                    "override executor url should win",
                )?;
                ensure(config.logging.level == "debug", "overridden log level should be debug")?;
                ensure(
                    config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                        == Some(true),
                    "env api key should win over file and defaults",
                )?;
                ensure(config.agent.max_iterations == 5, "env iteration cap should win over file")?;
                ensure(
                    config.llm.effective_model() == "claude-from-file",
                    "file model should win over default",
                )?;
                ensure(config.agent.concurrent_tool_dispatch, "file dispatch mode should apply")
            },
        )
    }

    #[test]
    fn file_selects_openai_provider_and_its_default_model() -> Result<(), String> {
        with_vars(&[("OPENAI_API_KEY", "sk-openai")], || {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sneakerdesk.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "openai"

[tools]
executor_url = "http://localhost:4000"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::OpenAi, "file should select openai")?;
            ensure(config.llm.effective_model() == "gpt-4o", "openai default model should apply")?;
            ensure(
                config.llm.effective_base_url() == "https://api.openai.com/v1",
                "openai default base url should apply",
            )
        })
    }

    #[test]
    fn legacy_open_ai_spelling_still_parses_from_file() -> Result<(), String> {
        with_vars(&[("SNEAKERDESK_LLM_API_KEY", "sk-test")], || {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sneakerdesk.toml");
            fs::write(
                &path,
                "[llm]\nprovider = \"open_ai\"\n\n[tools]\nexecutor_url = \"http://localhost:4000\"\n",
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.provider == LlmProvider::OpenAi, "open_ai alias should parse")
        })
    }

    #[test]
    fn default_model_follows_provider_unless_set() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_API_KEY", "sk-test"),
                ("SNEAKERDESK_TOOLS_EXECUTOR_URL", "http://localhost:4000"),
            ],
            || {
                let anthropic = AppConfig::load(LoadOptions::default())
                    .map_err(|err| format!("config load failed: {err}"))?;
                ensure(
                    anthropic.llm.effective_model() == "claude-sonnet-4-6",
                    "anthropic default model should apply",
                )?;

                let openai = AppConfig::load(LoadOptions {
                    overrides: ConfigOverrides {
                        llm_provider: Some(LlmProvider::OpenAi),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
                .map_err(|err| format!("config load failed: {err}"))?;
                ensure(openai.llm.effective_model() == "gpt-4o", "provider switch should move model")?;

                let pinned = AppConfig::load(LoadOptions {
                    overrides: ConfigOverrides {
                        llm_provider: Some(LlmProvider::OpenAi),
                        llm_model: Some("gpt-4.1-mini".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
                .map_err(|err| format!("config load failed: {err}"))?;
                ensure(
                    pinned.llm.effective_model() == "gpt-4.1-mini",
                    "explicit model should win over provider default",
                )
            },
        )
    }

    #[test]
    fn validation_fails_fast_without_executor_url() -> Result<(), String> {
        with_vars(&[("SNEAKERDESK_LLM_API_KEY", "sk-test")], || {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("tools.executor_url")
            );
            ensure(has_message, "validation failure should mention tools.executor_url")
        })
    }

    #[test]
    fn validation_rejects_unbounded_iteration_cap() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_API_KEY", "sk-test"),
                ("SNEAKERDESK_TOOLS_EXECUTOR_URL", "http://localhost:4000"),
                ("SNEAKERDESK_AGENT_MAX_ITERATIONS", "0"),
            ],
            || {
                let error = AppConfig::load(LoadOptions::default())
                    .err()
                    .ok_or_else(|| "zero iteration cap should be rejected".to_string())?;
                ensure(
                    error.to_string().contains("agent.max_iterations"),
                    "validation failure should mention agent.max_iterations",
                )
            },
        )
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_API_KEY", "sk-test"),
                ("SNEAKERDESK_TOOLS_EXECUTOR_URL", "http://localhost:4000"),
                ("SNEAKERDESK_SERVER_PORT", "eighty"),
            ],
            || {
                let error = AppConfig::load(LoadOptions::default())
                    .err()
                    .ok_or_else(|| "non-numeric port should be rejected".to_string())?;
                ensure(
                    matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "SNEAKERDESK_SERVER_PORT"),
                    "error should name the offending variable",
                )
            },
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        with_vars(
            &[
                ("SNEAKERDESK_LLM_API_KEY", "sk-secret-value"),
                ("SNEAKERDESK_TOOLS_EXECUTOR_URL", "http://localhost:4000"),
            ],
            || {
                let config = AppConfig::load(LoadOptions::default())
                    .map_err(|err| format!("config load failed: {err}"))?;
                let debug = format!("{config:?}");

                ensure(!debug.contains("sk-secret-value"), "debug output should not contain key")?;
                ensure(
                    matches!(config.logging.format, LogFormat::Compact),
                    "default logging format should be compact",
                )?;
                ensure(
                    config.agent.system_directive.contains("SneakerHub"),
                    "default directive should be the storefront directive",
                )
            },
        )
    }
}
