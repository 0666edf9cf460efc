pub mod ask;
pub mod config;
pub mod doctor;
pub mod smoke;

use std::sync::Arc;
use std::time::Duration;

use coursebot_agent::llm::{LlmError, OpenAiChatClient};
use coursebot_agent::router::ResponseRouter;
use coursebot_agent::runtime::ChatRuntime;
use coursebot_agent::store::{InMemoryConversationStore, StoreLimits};
use coursebot_core::catalog::CourseCatalog;
use coursebot_core::config::{AppConfig, ChatMode};
use coursebot_core::errors::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: &'static str,
    error_class: String,
    message: String,
}

impl CommandResult {
    /// Structured error payload; successful commands print their own report.
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error",
            error_class: error_class.to_string(),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    })
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Error)]
pub(crate) enum RuntimeSetupError {
    #[error("course catalog is invalid: {0}")]
    Catalog(#[from] DomainError),
    #[error("completion client setup failed: {0}")]
    Completion(#[from] LlmError),
}

impl RuntimeSetupError {
    pub(crate) fn error_class(&self) -> &'static str {
        match self {
            Self::Catalog(_) => "catalog_validation",
            Self::Completion(_) => "completion_setup",
        }
    }
}

/// Chat runtime wired the same way the server wires it, minus the sweeper.
/// The completion client is only built in model mode.
pub(crate) fn chat_runtime(config: &AppConfig) -> Result<ChatRuntime, RuntimeSetupError> {
    let catalog = Arc::new(CourseCatalog::new(config.course.clone())?);
    let store = Arc::new(InMemoryConversationStore::new(StoreLimits::from(&config.chat)));
    let mut router = ResponseRouter::new(catalog, store.clone(), config.chat.mode);

    if config.chat.mode == ChatMode::Model {
        if let Some(client) = OpenAiChatClient::from_config(&config.llm)? {
            let timeout = Duration::from_secs(config.llm.timeout_secs);
            router = router.with_completion(Arc::new(client), timeout);
        }
    }

    Ok(ChatRuntime::new(router, store))
}

pub(crate) fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}
