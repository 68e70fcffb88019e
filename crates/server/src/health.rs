use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use sneakerdesk_agent::ToolCatalog;

#[derive(Clone)]
pub struct HealthState {
    catalog: ToolCatalog,
    provider: &'static str,
}

impl HealthState {
    pub fn new(catalog: ToolCatalog, provider: &'static str) -> Self {
        Self { catalog, provider }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub tool_catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: format!("sneakerdesk-server running against {}", state.provider),
        },
        tool_catalog: HealthCheck {
            status: "ready",
            detail: format!(
                "{} profile with {} tools",
                state.catalog.profile().as_str(),
                state.catalog.len()
            ),
        },
        checked_at: Utc::now().to_rfc3339(),
    })
}
