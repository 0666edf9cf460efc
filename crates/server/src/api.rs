use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use coursebot_agent::runtime::{ChatReply, ChatRuntime};
use coursebot_core::catalog::{CourseCatalog, CourseInfo, FaqTable};
use coursebot_core::config::ChatMode;
use coursebot_core::domain::registration::RegistrationRecord;
use coursebot_core::errors::{ApplicationError, DomainError, ErrorClass};
use coursebot_sheets::recorder::{confirmation_message, RegistrationRecorder};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::health::{self, HealthState};

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatRuntime>,
    pub recorder: Arc<RegistrationRecorder>,
    pub catalog: Arc<CourseCatalog>,
    pub mode: ChatMode,
    /// Non-placeholder completion credentials were present at startup,
    /// whether or not the mode uses them.
    pub completion_configured: bool,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn health_state(&self) -> HealthState {
        HealthState {
            mode: self.mode,
            completion_configured: self.completion_configured,
            spreadsheet_configured: self.recorder.is_configured(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub context_length: usize,
    pub timestamp: String,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            context_length: reply.context_length,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    pub accepted: bool,
    pub message: String,
    pub registration_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegistrationInfo {
    pub process: &'static str,
    pub requirements: [&'static str; 3],
}

#[derive(Clone, Debug, Serialize)]
pub struct CourseInfoResponse {
    pub course_details: CourseInfo,
    pub faqs: FaqTable,
    pub registration_info: RegistrationInfo,
}

#[derive(Clone, Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ApiIndex {
    pub message: String,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

const ENDPOINTS: [EndpointInfo; 6] = [
    EndpointInfo {
        method: "POST",
        path: "/start",
        description: "Start a conversation with the chatbot",
    },
    EndpointInfo { method: "POST", path: "/chat", description: "Send a message to the chatbot" },
    EndpointInfo { method: "POST", path: "/register", description: "Register for the course" },
    EndpointInfo { method: "GET", path: "/course-info", description: "Get course information" },
    EndpointInfo {
        method: "GET",
        path: "/health",
        description: "Report which integrations are configured",
    },
    EndpointInfo { method: "GET", path: "/api", description: "This endpoint index" },
];

pub fn router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();
    let health_state = state.health_state();

    Router::new()
        .route("/start", post(start_conversation))
        .route("/chat", post(chat))
        .route("/register", post(register))
        .route("/course-info", get(course_info))
        .route("/api", get(api_index))
        .with_state(state)
        .merge(health::router(health_state))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn error_response(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let error = error.into_interface(correlation_id);
    let status = match error.class {
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(
        event_name = "http.request.rejected",
        correlation_id = %error.correlation_id,
        status = status.as_u16(),
        error = %error,
        "request rejected"
    );
    (
        status,
        Json(ApiError {
            error: error.user_message().to_string(),
            detail: error.message,
            correlation_id: error.correlation_id,
        }),
    )
}

fn domain_error(error: DomainError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    error_response(ApplicationError::from(error), correlation_id)
}

fn rejected_body(rejection: JsonRejection, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    error_response(ApplicationError::MalformedRequest(rejection.body_text()), correlation_id)
}

pub async fn start_conversation(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let correlation_id = new_correlation_id();
    let Json(request) = payload.map_err(|rejection| rejected_body(rejection, &correlation_id))?;

    let reply = state
        .chat
        .start(&request.user_id)
        .await
        .map_err(|error| domain_error(error, &correlation_id))?;

    Ok(Json(ChatResponse::from(reply)))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let correlation_id = new_correlation_id();
    let Json(request) = payload.map_err(|rejection| rejected_body(rejection, &correlation_id))?;

    let reply = state
        .chat
        .chat(&request.user_id, &request.message)
        .await
        .map_err(|error| domain_error(error, &correlation_id))?;

    info!(
        event_name = "http.chat.replied",
        correlation_id = %correlation_id,
        user_id = %request.user_id,
        route = reply.route.as_str(),
        "chat reply sent"
    );
    Ok(Json(ChatResponse::from(reply)))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRecord>, JsonRejection>,
) -> ApiResult<RegistrationResponse> {
    let correlation_id = new_correlation_id();
    let Json(registration) =
        payload.map_err(|rejection| rejected_body(rejection, &correlation_id))?;
    registration.validate().map_err(|error| domain_error(error, &correlation_id))?;

    let received_at = Utc::now();
    let registration_id = registration.registration_id(received_at);
    let outcome = state.recorder.record_at(&registration, received_at).await;
    let message = confirmation_message(&registration, state.recorder.course_name(), outcome);

    if let Some(user_id) = registration.user_id() {
        state.chat.record_exchange(user_id, &registration.transcript_line(), &message).await;
    }

    info!(
        event_name = "http.registration.received",
        correlation_id = %correlation_id,
        registration_id = %registration_id.0,
        accepted = outcome.accepted,
        "registration processed"
    );

    Ok(Json(RegistrationResponse {
        success: true,
        accepted: outcome.accepted,
        message,
        registration_id: registration_id.0,
    }))
}

pub async fn course_info(State(state): State<AppState>) -> Json<CourseInfoResponse> {
    Json(CourseInfoResponse {
        course_details: state.catalog.course.clone(),
        faqs: state.catalog.faqs.clone(),
        registration_info: RegistrationInfo {
            process: "Use the /register endpoint with name, email, and phone",
            requirements: ["Valid email address", "Phone number", "Full name"],
        },
    })
}

pub async fn api_index(State(state): State<AppState>) -> Json<ApiIndex> {
    Json(ApiIndex {
        message: format!("Welcome to {} Chatbot API", state.catalog.course.name),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS.to_vec(),
    })
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            error: "Endpoint not found. See /api for available endpoints.".to_string(),
            detail: "no route matched the request".to_string(),
            correlation_id: new_correlation_id(),
        }),
    )
}
