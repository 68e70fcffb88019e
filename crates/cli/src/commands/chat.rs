use serde::Serialize;
use sneakerdesk_agent::AgentRuntime;
use sneakerdesk_core::config::{AppConfig, LoadOptions};
use sneakerdesk_core::ActionLogEntry;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ChatOutput {
    command: &'static str,
    status: &'static str,
    correlation_id: String,
    reply: String,
    actions: Vec<ActionLogEntry>,
}

pub fn run(message: &str, user_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match AgentRuntime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("chat", "runtime_init", format!("{error:#}"), 3)
        }
    };

    run_with_runtime(&runtime, message, user_id)
}

/// Runs one orchestration on a blocking current-thread runtime.
pub fn run_with_runtime(runtime: &AgentRuntime, message: &str, user_id: &str) -> CommandResult {
    let executor = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(executor) => executor,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        }
    };

    let correlation_id = format!("cli-{}", std::process::id());
    match executor.block_on(runtime.handle_chat_message(message, user_id, &correlation_id)) {
        Ok(outcome) => CommandResult::document(
            "chat",
            &ChatOutput {
                command: "chat",
                status: "ok",
                correlation_id,
                reply: outcome.reply,
                actions: outcome.actions,
            },
        ),
        Err(error) => CommandResult::failure("chat", error.error_class(), error.to_string(), 1),
    }
}
