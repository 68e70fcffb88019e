use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sneakerdesk_agent::AgentRuntime;
use sneakerdesk_core::{InterfaceError, OrchestrationOutcome};
use tracing::error;
use uuid::Uuid;

pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

impl ChatState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "userId", default = "anonymous_user")]
    pub user_id: String,
}

fn anonymous_user() -> String {
    ANONYMOUS_USER.to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(ChatState::new(runtime))
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<OrchestrationOutcome>, (StatusCode, Json<ChatError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let Json(request) = payload.map_err(|rejection| {
        interface_error(InterfaceError::BadRequest {
            message: rejection.body_text(),
            correlation_id: correlation_id.clone(),
        })
    })?;

    state
        .runtime
        .handle_chat_message(&request.message, &request.user_id, &correlation_id)
        .await
        .map(Json)
        .map_err(|failure| interface_error(failure.into_interface(correlation_id.clone())))
}

fn interface_error(failure: InterfaceError) -> (StatusCode, Json<ChatError>) {
    let status =
        StatusCode::from_u16(failure.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error!(
        event_name = "server.chat.error",
        correlation_id = failure.correlation_id(),
        status = status.as_u16(),
        error = %failure,
        "chat request failed"
    );
    (status, Json(ChatError { error: failure.to_string() }))
}
