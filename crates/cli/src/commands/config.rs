use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use coursebot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use super::{escape_json, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    precedence: &'static str,
    config_file: Option<String>,
    entries: Vec<ConfigEntry>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entry = |key: &'static str, value: String, env_keys: &[&str]| ConfigEntry {
        key,
        value,
        source: field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
    };

    let entries = vec![
        entry("llm.provider", format!("{:?}", config.llm.provider), &["COURSEBOT_LLM_PROVIDER"]),
        entry("llm.model", config.llm.model.clone(), &["COURSEBOT_LLM_MODEL"]),
        entry(
            "llm.base_url",
            config.llm.effective_base_url().to_string(),
            &["COURSEBOT_LLM_BASE_URL"],
        ),
        entry(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["COURSEBOT_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        entry("llm.max_tokens", config.llm.max_tokens.to_string(), &["COURSEBOT_LLM_MAX_TOKENS"]),
        entry(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["COURSEBOT_LLM_TEMPERATURE"],
        ),
        entry(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["COURSEBOT_LLM_TIMEOUT_SECS"],
        ),
        entry(
            "sheets.spreadsheet_id",
            config.sheets.spreadsheet_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["COURSEBOT_SHEETS_SPREADSHEET_ID"],
        ),
        entry(
            "sheets.sheet_name",
            config.sheets.sheet_name.clone(),
            &["COURSEBOT_SHEETS_SHEET_NAME"],
        ),
        entry(
            "sheets.access_token",
            redact_secret(config.sheets.access_token.as_ref()),
            &["COURSEBOT_SHEETS_ACCESS_TOKEN"],
        ),
        entry("sheets.base_url", config.sheets.base_url.clone(), &["COURSEBOT_SHEETS_BASE_URL"]),
        entry("chat.mode", config.chat.mode.as_str().to_string(), &["COURSEBOT_CHAT_MODE"]),
        entry(
            "chat.idle_ttl_secs",
            config.chat.idle_ttl_secs.to_string(),
            &["COURSEBOT_CHAT_IDLE_TTL_SECS"],
        ),
        entry(
            "chat.max_conversations",
            config.chat.max_conversations.to_string(),
            &["COURSEBOT_CHAT_MAX_CONVERSATIONS"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["COURSEBOT_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["COURSEBOT_SERVER_PORT"]),
        entry(
            "server.static_dir",
            config.server.static_dir.display().to_string(),
            &["COURSEBOT_SERVER_STATIC_DIR"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["COURSEBOT_LOGGING_LEVEL", "COURSEBOT_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["COURSEBOT_LOGGING_FORMAT", "COURSEBOT_LOG_FORMAT"],
        ),
        entry("course.name", config.course.name.clone(), &[]),
        entry("course.price", config.course.price.clone(), &[]),
    ];

    let report = ConfigReport {
        command: "config",
        precedence: "env > file > default",
        config_file: config_file_path.map(|path| path.display().to_string()),
        entries,
    };

    let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"config\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });
    CommandResult { exit_code: 0, output }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("coursebot.toml"), PathBuf::from("config/coursebot.toml")]
        .into_iter()
        .find(|path| path.exists())
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
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };

    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
