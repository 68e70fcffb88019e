use std::sync::Arc;

use futures::future::try_join_all;
use sneakerdesk_core::config::AppConfig;
use sneakerdesk_core::{
    ActionLogEntry, ApplicationError, DomainError, OrchestrationOutcome, ToolInvocationRequest,
    ToolInvocationResult, Transcript,
};
use tracing::{info, warn};

use crate::executor::{HttpToolExecutor, ToolExecutor};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{client_from_config, LlmClient, ModelOutcome};
use crate::tools::ToolCatalog;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Text of the opening user turn. The caller's identity is only ever text here.
pub fn seed_text(message: &str, user_id: &str) -> String {
    format!("[userId: {user_id}] {message}")
}

/// Drives the model/tool loop for one inbound chat message.
///
/// Holds no per-request state: each call builds its own transcript, so one runtime
/// is shared across concurrent requests behind an `Arc`.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn ToolExecutor>,
    catalog: ToolCatalog,
    guardrails: GuardrailPolicy,
    system_directive: String,
    dispatch: DispatchMode,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn ToolExecutor>,
        catalog: ToolCatalog,
    ) -> Self {
        Self {
            llm,
            executor,
            catalog,
            guardrails: GuardrailPolicy::default(),
            system_directive: sneakerdesk_core::config::DEFAULT_SYSTEM_DIRECTIVE.to_string(),
            dispatch: DispatchMode::default(),
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let llm = client_from_config(&config.llm)?;
        let executor = Arc::new(HttpToolExecutor::from_config(&config.tools)?);

        Ok(Self::new(llm, executor, ToolCatalog::for_profile(config.tools.catalog))
            .with_guardrails(GuardrailPolicy::from_config(&config.agent))
            .with_system_directive(config.agent.system_directive.clone())
            .with_dispatch_mode(if config.agent.concurrent_tool_dispatch {
                DispatchMode::Concurrent
            } else {
                DispatchMode::Sequential
            }))
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_system_directive(mut self, directive: impl Into<String>) -> Self {
        self.system_directive = directive.into();
        self
    }

    pub fn with_dispatch_mode(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn provider_name(&self) -> &'static str {
        self.llm.provider_name()
    }

    pub async fn handle_chat_message(
        &self,
        message: &str,
        user_id: &str,
        correlation_id: &str,
    ) -> Result<OrchestrationOutcome, ApplicationError> {
        info!(
            event_name = "agent.run.start",
            correlation_id,
            provider = self.llm.provider_name(),
            catalog = self.catalog.profile().as_str(),
            message_chars = message.chars().count(),
            "orchestration run started"
        );

        let result = self.run(Transcript::seeded(seed_text(message, user_id)), correlation_id).await;
        match &result {
            Ok(outcome) => info!(
                event_name = "agent.run.completed",
                correlation_id,
                actions = outcome.actions.len(),
                "orchestration run completed"
            ),
            Err(error) => warn!(
                event_name = "agent.run.failed",
                correlation_id,
                error_class = error.error_class(),
                "orchestration run aborted"
            ),
        }
        result
    }

    /// Runs the loop from an already-seeded transcript until the model gives a final answer.
    pub async fn run(
        &self,
        mut transcript: Transcript,
        correlation_id: &str,
    ) -> Result<OrchestrationOutcome, ApplicationError> {
        let mut actions = Vec::new();
        let mut model_calls = 0u32;

        loop {
            transcript.ensure_consistent()?;
            model_calls += 1;

            let outcome = self
                .llm
                .complete_turn(&transcript, &self.system_directive, &self.catalog)
                .await
                .map_err(|error| ApplicationError::ModelCall(format!("{error:#}")))?;

            info!(
                event_name = "agent.model.outcome",
                correlation_id,
                model_call = model_calls,
                final_answer = outcome.is_final(),
                "model call returned"
            );

            let (text, requests) = match outcome {
                ModelOutcome::FinalAnswer { text } => {
                    transcript.push_assistant_text(text.clone())?;
                    return Ok(OrchestrationOutcome { reply: text, actions });
                }
                ModelOutcome::ToolRequests { text, requests } => (text, requests),
            };

            if !self.guardrails.allows_another_model_call(model_calls) {
                return Err(ApplicationError::IterationLimitExceeded {
                    limit: self.guardrails.max_iterations,
                });
            }

            for request in &requests {
                if let GuardrailDecision::Deny { reason_code, detail } =
                    self.guardrails.evaluate(&self.catalog, request)
                {
                    return Err(DomainError::ToolInputRejected {
                        tool: request.name.clone(),
                        reason_code,
                        detail,
                    }
                    .into());
                }
            }

            transcript.push_tool_requests(text, requests.clone())?;
            let dispatched = self.dispatch(&requests, correlation_id).await?;

            let mut results = Vec::with_capacity(dispatched.len());
            for (entry, result) in dispatched {
                actions.push(entry);
                results.push(result);
            }
            transcript.push_tool_results(results)?;
        }
    }

    /// Invokes every request of one turn; output order always matches request order.
    async fn dispatch(
        &self,
        requests: &[ToolInvocationRequest],
        correlation_id: &str,
    ) -> Result<Vec<(ActionLogEntry, ToolInvocationResult)>, ApplicationError> {
        match self.dispatch {
            DispatchMode::Sequential => {
                let mut dispatched = Vec::with_capacity(requests.len());
                for request in requests {
                    dispatched.push(self.invoke_one(request, correlation_id).await?);
                }
                Ok(dispatched)
            }
            DispatchMode::Concurrent => {
                try_join_all(requests.iter().map(|request| self.invoke_one(request, correlation_id)))
                    .await
            }
        }
    }

    async fn invoke_one(
        &self,
        request: &ToolInvocationRequest,
        correlation_id: &str,
    ) -> Result<(ActionLogEntry, ToolInvocationResult), ApplicationError> {
        info!(
            event_name = "agent.tool.dispatch",
            correlation_id,
            tool = %request.name,
            tool_call_id = request.id.as_str(),
            "dispatching tool invocation"
        );

        let value = self.executor.invoke(&request.name, &request.input).await.map_err(|error| {
            ApplicationError::ToolExecution { tool: request.name.clone(), message: format!("{error:#}") }
        })?;
        let serialized = value.to_string();

        info!(
            event_name = "agent.tool.result",
            correlation_id,
            tool = %request.name,
            tool_call_id = request.id.as_str(),
            result_bytes = serialized.len(),
            "tool invocation returned"
        );

        Ok((
            ActionLogEntry {
                tool: request.name.clone(),
                input: request.input.clone(),
                result: serialized.clone(),
            },
            ToolInvocationResult { id: request.id.clone(), output: serialized },
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use sneakerdesk_core::{ApplicationError, DomainError, Turn};

    use super::{seed_text, AgentRuntime, DispatchMode};
    use crate::fixtures::{tool_request, RecordingExecutor, ScriptedLlmClient};
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::ModelOutcome;
    use crate::tools::ToolCatalog;

    fn runtime(llm: &Arc<ScriptedLlmClient>, executor: &Arc<RecordingExecutor>) -> AgentRuntime {
        AgentRuntime::new(llm.clone(), executor.clone(), ToolCatalog::storefront())
    }

    #[test]
    fn seed_text_prefixes_the_claimed_identity() {
        assert_eq!(seed_text("hello", "u-42"), "[userId: u-42] hello");
        assert_eq!(seed_text("", "u-42"), "[userId: u-42] ");
    }

    #[tokio::test]
    async fn question_without_tool_intent_returns_reply_and_no_actions() {
        let llm = Arc::new(ScriptedLlmClient::answering("We carry runners, trail and court shoes."));
        let executor = Arc::new(RecordingExecutor::new());

        let outcome = runtime(&llm, &executor)
            .handle_chat_message("What shoes do you have?", "u1", "corr-1")
            .await
            .expect("run should succeed");

        assert_eq!(outcome.reply, "We carry runners, trail and court shoes.");
        assert!(outcome.actions.is_empty());
        assert!(executor.calls().is_empty());
        let seen = llm.seen_transcripts();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].turns(), &[Turn::User { text: "[userId: u1] What shoes do you have?".to_string() }]);
    }

    #[tokio::test]
    async fn refund_request_dispatches_once_and_records_the_action() {
        let llm = Arc::new(ScriptedLlmClient::new([
            ModelOutcome::ToolRequests {
                text: None,
                requests: vec![tool_request(
                    "toolu_1",
                    "process_refund",
                    json!({ "order_id": "ORD123", "amount": 50 }),
                )],
            },
            ModelOutcome::FinalAnswer { text: "Your refund for ORD123 is on its way.".to_string() },
        ]));
        let executor =
            Arc::new(RecordingExecutor::new().with_response("process_refund", json!({ "status": "ok" })));

        let outcome = runtime(&llm, &executor)
            .handle_chat_message("Please refund $50 for order ORD123", "u1", "corr-2")
            .await
            .expect("run should succeed");

        assert_eq!(outcome.reply, "Your refund for ORD123 is on its way.");
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].tool, "process_refund");
        assert_eq!(outcome.actions[0].input, json!({ "order_id": "ORD123", "amount": 50 }));
        assert_eq!(outcome.actions[0].result, r#"{"status":"ok"}"#);

        let second_call = &llm.seen_transcripts()[1];
        let Some(Turn::ToolResults { results }) = second_call.turns().last() else {
            panic!("second model call should see the tool results");
        };
        assert_eq!(results[0].id.as_str(), "toolu_1");
        assert_eq!(results[0].output, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn executor_failure_aborts_without_an_outcome() {
        let llm = Arc::new(ScriptedLlmClient::new([ModelOutcome::ToolRequests {
            text: None,
            requests: vec![tool_request("t1", "process_refund", json!({ "order_id": "ORD1", "amount": 5 }))],
        }]));
        let executor = Arc::new(
            RecordingExecutor::new().with_failure("process_refund", "connection refused"),
        );

        let error = runtime(&llm, &executor)
            .handle_chat_message("refund", "u1", "corr-3")
            .await
            .expect_err("executor failure should abort");

        assert!(matches!(error, ApplicationError::ToolExecution { ref tool, .. } if tool == "process_refund"));
        assert!(error.to_string().contains("connection refused"));
        assert_eq!(llm.calls(), 1, "no further model call after a failed dispatch");
    }

    #[tokio::test]
    async fn two_requests_in_one_turn_are_both_folded_back() {
        let llm = Arc::new(ScriptedLlmClient::new([
            ModelOutcome::ToolRequests {
                text: Some("Looking that up.".to_string()),
                requests: vec![
                    tool_request("a", "get_all_customers", json!({})),
                    tool_request("b", "update_price", json!({ "product_id": "SHOE001", "new_price": 1 })),
                ],
            },
            ModelOutcome::FinalAnswer { text: "Done.".to_string() },
        ]));
        let executor = Arc::new(
            RecordingExecutor::new()
                .with_response("get_all_customers", json!([{ "id": "CUST001" }]))
                .with_response("update_price", json!({ "updated": true })),
        );

        let outcome = runtime(&llm, &executor)
            .handle_chat_message("list customers and set SHOE001 to $1", "u1", "corr-4")
            .await
            .expect("run should succeed");

        let tools: Vec<_> = outcome.actions.iter().map(|action| action.tool.as_str()).collect();
        assert_eq!(tools, vec!["get_all_customers", "update_price"]);

        let second_call = &llm.seen_transcripts()[1];
        assert_eq!(second_call.len(), 3);
        let Some(Turn::ToolResults { results }) = second_call.turns().last() else {
            panic!("expected tool results");
        };
        let ids: Vec<_> = results.iter().map(|result| result.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(results[1].output, r#"{"updated":true}"#);
    }

    #[tokio::test]
    async fn empty_message_still_produces_an_outcome() {
        let llm = Arc::new(ScriptedLlmClient::answering("How can I help?"));
        let executor = Arc::new(RecordingExecutor::new());

        let outcome = runtime(&llm, &executor)
            .handle_chat_message("", "anonymous", "corr-5")
            .await
            .expect("run should succeed");

        assert_eq!(outcome.reply, "How can I help?");
        assert_eq!(llm.seen_transcripts()[0].len(), 1);
    }

    #[tokio::test]
    async fn model_failure_maps_to_model_call_error() {
        let llm = Arc::new(ScriptedLlmClient::failing("anthropic API error 529"));
        let executor = Arc::new(RecordingExecutor::new());

        let error = runtime(&llm, &executor)
            .handle_chat_message("hi", "u1", "corr-6")
            .await
            .expect_err("model failure");

        assert!(matches!(error, ApplicationError::ModelCall(ref message) if message.contains("529")));
    }

    #[tokio::test]
    async fn iteration_cap_aborts_before_dispatching() {
        let looping = (0..3).map(|index| ModelOutcome::ToolRequests {
            text: None,
            requests: vec![tool_request(&format!("t{index}"), "get_all_customers", json!({}))],
        });
        let llm = Arc::new(ScriptedLlmClient::new(looping));
        let executor = Arc::new(RecordingExecutor::new());

        let error = runtime(&llm, &executor)
            .with_guardrails(GuardrailPolicy { max_iterations: 2, ..GuardrailPolicy::default() })
            .handle_chat_message("loop forever", "u1", "corr-7")
            .await
            .expect_err("cap should trip");

        assert!(matches!(error, ApplicationError::IterationLimitExceeded { limit: 2 }));
        assert_eq!(llm.calls(), 2);
        assert_eq!(executor.calls().len(), 1, "the capped turn must not be dispatched");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_dispatch() {
        let llm = Arc::new(ScriptedLlmClient::new([ModelOutcome::ToolRequests {
            text: None,
            requests: vec![tool_request("t1", "update_price", json!({ "product_id": "SHOE001" }))],
        }]));
        let executor = Arc::new(RecordingExecutor::new());

        let error = runtime(&llm, &executor)
            .handle_chat_message("make it cheaper", "u1", "corr-8")
            .await
            .expect_err("missing new_price");

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::ToolInputRejected { reason_code: "missing_required_field", .. })
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn validation_off_passes_requests_through() {
        let llm = Arc::new(ScriptedLlmClient::new([
            ModelOutcome::ToolRequests {
                text: None,
                requests: vec![tool_request("t1", "not_a_tool", json!({}))],
            },
            ModelOutcome::FinalAnswer { text: "ok".to_string() },
        ]));
        let executor = Arc::new(RecordingExecutor::new());

        let outcome = runtime(&llm, &executor)
            .with_guardrails(GuardrailPolicy { validate_tool_input: false, ..GuardrailPolicy::default() })
            .handle_chat_message("anything", "u1", "corr-9")
            .await
            .expect("run should succeed");

        assert_eq!(outcome.actions[0].tool, "not_a_tool");
        assert_eq!(outcome.actions[0].result, "null");
    }

    #[tokio::test]
    async fn concurrent_dispatch_keeps_request_order() {
        let llm = Arc::new(ScriptedLlmClient::new([
            ModelOutcome::ToolRequests {
                text: None,
                requests: vec![
                    tool_request("slow", "get_all_customers", json!({})),
                    tool_request("fast", "update_price", json!({ "product_id": "SHOE001", "new_price": 90 })),
                ],
            },
            ModelOutcome::FinalAnswer { text: "Done.".to_string() },
        ]));
        let executor = Arc::new(
            RecordingExecutor::new()
                .with_response("get_all_customers", json!([]))
                .with_response("update_price", json!({ "updated": true }))
                .with_delay("get_all_customers", Duration::from_millis(150)),
        );

        let outcome = runtime(&llm, &executor)
            .with_dispatch_mode(DispatchMode::Concurrent)
            .handle_chat_message("both at once", "u1", "corr-10")
            .await
            .expect("run should succeed");

        let completion_order: Vec<_> = executor.calls().into_iter().map(|(tool, _)| tool).collect();
        assert_eq!(completion_order, vec!["update_price", "get_all_customers"]);

        let tools: Vec<_> = outcome.actions.iter().map(|action| action.tool.as_str()).collect();
        assert_eq!(tools, vec!["get_all_customers", "update_price"]);
        let Some(Turn::ToolResults { results }) = llm.seen_transcripts()[1].turns().last().cloned()
        else {
            panic!("expected tool results");
        };
        assert_eq!(results[0].id.as_str(), "slow");
        assert_eq!(results[1].id.as_str(), "fast");
    }
}
