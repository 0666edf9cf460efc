use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coursebot_agent::llm::{LlmError, OpenAiChatClient};
use coursebot_agent::router::ResponseRouter;
use coursebot_agent::runtime::ChatRuntime;
use coursebot_agent::store::{InMemoryConversationStore, StoreLimits};
use coursebot_core::catalog::CourseCatalog;
use coursebot_core::config::{AppConfig, ChatMode, ConfigError, LoadOptions};
use coursebot_core::errors::DomainError;
use coursebot_sheets::client::{GoogleSheetsClient, RowSink, SheetsError};
use coursebot_sheets::recorder::RegistrationRecorder;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("course catalog is invalid: {0}")]
    Catalog(#[source] DomainError),
    #[error("completion client setup failed: {0}")]
    Completion(#[source] LlmError),
    #[error("spreadsheet client setup failed: {0}")]
    Spreadsheet(#[source] SheetsError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        mode = config.chat.mode.as_str(),
        "starting application bootstrap"
    );

    let catalog =
        Arc::new(CourseCatalog::new(config.course.clone()).map_err(BootstrapError::Catalog)?);
    let store = Arc::new(InMemoryConversationStore::new(StoreLimits::from(&config.chat)));
    let mut router = ResponseRouter::new(Arc::clone(&catalog), store.clone(), config.chat.mode);

    if config.chat.mode == ChatMode::Model {
        let client =
            OpenAiChatClient::from_config(&config.llm).map_err(BootstrapError::Completion)?;
        if let Some(client) = client {
            let timeout = Duration::from_secs(config.llm.timeout_secs);
            router = router.with_completion(Arc::new(client), timeout);
        }
    }
    info!(
        event_name = "system.bootstrap.completion",
        correlation_id = "bootstrap",
        configured = router.completion_configured(),
        model = %config.llm.model,
        "completion client initialized"
    );

    let sink = GoogleSheetsClient::from_config(&config.sheets)
        .map_err(BootstrapError::Spreadsheet)?
        .map(|client| Arc::new(client) as Arc<dyn RowSink>);
    let recorder = RegistrationRecorder::new(sink, config.course.name.clone());
    info!(
        event_name = "system.bootstrap.spreadsheet",
        correlation_id = "bootstrap",
        configured = recorder.is_configured(),
        "registration recorder initialized"
    );

    let state = AppState {
        chat: Arc::new(ChatRuntime::new(router, store)),
        recorder: Arc::new(recorder),
        catalog,
        mode: config.chat.mode,
        completion_configured: config.llm.is_configured(),
        static_dir: config.server.static_dir.clone(),
    };

    Ok(Application { config, state })
}

/// Periodically drops idle conversations until the runtime shuts down.
pub fn spawn_sweeper(chat: Arc<ChatRuntime>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            chat.sweep(Utc::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, Json};
    use coursebot_core::config::{ChatMode, ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;
    use crate::health::health;

    fn options(overrides: ConfigOverrides) -> LoadOptions {
        LoadOptions { overrides, ..LoadOptions::default() }
    }

    #[tokio::test]
    async fn bootstrap_degrades_without_credentials() {
        let app = bootstrap(options(ConfigOverrides {
            llm_api_key: Some("your-openai-api-key-here".to_string()),
            ..ConfigOverrides::default()
        }))
        .await
        .expect("bootstrap should not require credentials");

        let health = app.state.health_state();
        assert!(!health.completion_configured);
        assert!(!health.spreadsheet_configured);
    }

    #[tokio::test]
    async fn bootstrap_wires_configured_integrations() {
        let app = bootstrap(options(ConfigOverrides {
            llm_api_key: Some("sk-test-123".to_string()),
            sheets_spreadsheet_id: Some("sheet-123".to_string()),
            sheets_access_token: Some("ya29.token".to_string()),
            ..ConfigOverrides::default()
        }))
        .await
        .expect("bootstrap");

        let health = app.state.health_state();
        assert!(health.completion_configured);
        assert!(health.spreadsheet_configured);
        assert_eq!(app.state.catalog.course.name, app.config.course.name);
    }

    #[tokio::test]
    async fn canned_mode_skips_completion_client_but_reports_credentials() {
        let app = bootstrap(options(ConfigOverrides {
            llm_api_key: Some("sk-real-key".to_string()),
            chat_mode: Some(ChatMode::Canned),
            ..ConfigOverrides::default()
        }))
        .await
        .expect("bootstrap");

        assert_eq!(app.state.mode, ChatMode::Canned);
        assert!(!app.state.chat.router().completion_configured());

        let (_, Json(payload)) = health(State(app.state.health_state())).await;
        assert!(payload.completion_configured);
        assert_eq!(payload.mode, "canned");
        assert_eq!(payload.status, "degraded");
    }

    #[tokio::test]
    async fn invalid_config_fails_fast() {
        let result = bootstrap(options(ConfigOverrides {
            log_level: Some("loud".to_string()),
            ..ConfigOverrides::default()
        }))
        .await;

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("logging.level"));
    }
}
