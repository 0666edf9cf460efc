use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use coursebot_core::config::ChatMode;
use serde::Serialize;

/// Configuration flags captured at startup. Health never contacts the
/// completion or spreadsheet services.
#[derive(Clone, Copy, Debug)]
pub struct HealthState {
    pub mode: ChatMode,
    pub completion_configured: bool,
    pub spreadsheet_configured: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: &'static str,
    pub completion_configured: bool,
    pub spreadsheet_configured: bool,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let completion_ready = state.mode == ChatMode::Canned || state.completion_configured;
    let healthy = completion_ready && state.spreadsheet_configured;

    let payload = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        mode: state.mode.as_str(),
        completion_configured: state.completion_configured,
        spreadsheet_configured: state.spreadsheet_configured,
        checked_at: Utc::now().to_rfc3339(),
    };

    // Missing integrations degrade replies but never stop the service.
    (StatusCode::OK, Json(payload))
}
