use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CourseInfo;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub sheets: SheetsConfig,
    pub chat: ChatConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub course: CourseInfo,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub access_token: Option<SecretString>,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub mode: ChatMode,
    pub idle_ttl_secs: u64,
    pub max_conversations: usize,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub static_dir: PathBuf,
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
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    Ollama,
}

/// How the response router answers messages that match no canned rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Delegate to the completion service.
    Model,
    /// Reply with a fixed help text; never calls out.
    Canned,
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
    pub chat_mode: Option<ChatMode>,
    pub sheets_spreadsheet_id: Option<String>,
    pub sheets_access_token: Option<String>,
    pub sheets_base_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub course_name: Option<String>,
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

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

const PLACEHOLDER_CREDENTIALS: [&str; 4] =
    ["your-openai-api-key-here", "changeme", "replace-me", "credentials.json"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                max_tokens: 500,
                temperature: 0.7,
                timeout_secs: 30,
            },
            sheets: SheetsConfig {
                spreadsheet_id: None,
                sheet_name: "Registrations".to_string(),
                access_token: None,
                base_url: "https://sheets.googleapis.com".to_string(),
                timeout_secs: 30,
            },
            chat: ChatConfig {
                mode: ChatMode::Model,
                idle_ttl_secs: 3_600,
                max_conversations: 10_000,
                sweep_interval_secs: 60,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                static_dir: PathBuf::from("static"),
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            course: CourseInfo::default(),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl FromStr for ChatMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "canned" | "demo" => Ok(Self::Canned),
            other => Err(ConfigError::Validation(format!(
                "unsupported chat mode `{other}` (expected model|canned)"
            ))),
        }
    }
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Canned => "canned",
        }
    }
}

impl FromStr for LogFormat {
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
    /// Whether a completion call could be attempted at all. Does not contact
    /// the provider.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi => {
                credential_present(self.api_key.as_ref().map(|key| key.expose_secret()))
            }
            LlmProvider::Ollama => true,
        }
    }

    pub fn effective_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(base_url), _) if !base_url.trim().is_empty() => base_url.trim_end_matches('/'),
            (_, LlmProvider::OpenAi) => DEFAULT_OPENAI_BASE_URL,
            (_, LlmProvider::Ollama) => DEFAULT_OLLAMA_BASE_URL,
        }
    }
}

impl SheetsConfig {
    pub fn is_configured(&self) -> bool {
        credential_present(self.spreadsheet_id.as_deref())
            && credential_present(self.access_token.as_ref().map(|token| token.expose_secret()))
    }
}

/// True when `value` looks like a real credential rather than an empty or
/// template placeholder.
pub fn credential_present(value: Option<&str>) -> bool {
    let Some(value) = value.map(str::trim) else {
        return false;
    };
    if value.is_empty() {
        return false;
    }
    let lowered = value.to_ascii_lowercase();
    if PLACEHOLDER_CREDENTIALS.contains(&lowered.as_str()) || lowered.starts_with("your-") {
        return false;
    }
    !(value.starts_with('<') && value.ends_with('>'))
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
                options.config_path.unwrap_or_else(|| PathBuf::from("coursebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            merge(&mut self.llm.provider, llm.provider);
            merge_secret(&mut self.llm.api_key, llm.api_key);
            merge_optional(&mut self.llm.base_url, llm.base_url);
            merge(&mut self.llm.model, llm.model);
            merge(&mut self.llm.max_tokens, llm.max_tokens);
            merge(&mut self.llm.temperature, llm.temperature);
            merge(&mut self.llm.timeout_secs, llm.timeout_secs);
        }

        if let Some(sheets) = patch.sheets {
            merge_optional(&mut self.sheets.spreadsheet_id, sheets.spreadsheet_id);
            merge(&mut self.sheets.sheet_name, sheets.sheet_name);
            merge_secret(&mut self.sheets.access_token, sheets.access_token);
            merge(&mut self.sheets.base_url, sheets.base_url);
            merge(&mut self.sheets.timeout_secs, sheets.timeout_secs);
        }

        if let Some(chat) = patch.chat {
            merge(&mut self.chat.mode, chat.mode);
            merge(&mut self.chat.idle_ttl_secs, chat.idle_ttl_secs);
            merge(&mut self.chat.max_conversations, chat.max_conversations);
            merge(&mut self.chat.sweep_interval_secs, chat.sweep_interval_secs);
        }

        if let Some(server) = patch.server {
            merge(&mut self.server.bind_address, server.bind_address);
            merge(&mut self.server.port, server.port);
            merge(&mut self.server.static_dir, server.static_dir);
            merge(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }

        if let Some(logging) = patch.logging {
            merge(&mut self.logging.level, logging.level);
            merge(&mut self.logging.format, logging.format);
        }

        if let Some(course) = patch.course {
            let target = &mut self.course;
            merge(&mut target.name, course.name);
            merge(&mut target.duration, course.duration);
            merge(&mut target.price, course.price);
            merge(&mut target.instructor, course.instructor);
            merge(&mut target.format, course.format);
            merge(&mut target.schedule, course.schedule);
            merge(&mut target.description, course.description);
            merge(&mut target.benefits, course.benefits);
            merge(&mut target.prerequisites, course.prerequisites);
            merge(&mut target.support, course.support);
        }
    }

    /// `COURSEBOT_*` variables; blank values count as unset. The API key also
    /// falls back to the conventional `OPENAI_API_KEY`.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(provider) = read_env("COURSEBOT_LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        merge_secret(
            &mut self.llm.api_key,
            read_env("COURSEBOT_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY")),
        );
        merge_optional(&mut self.llm.base_url, read_env("COURSEBOT_LLM_BASE_URL"));
        merge(&mut self.llm.model, read_env("COURSEBOT_LLM_MODEL"));
        merge(&mut self.llm.max_tokens, env_number("COURSEBOT_LLM_MAX_TOKENS")?);
        merge(&mut self.llm.temperature, env_number("COURSEBOT_LLM_TEMPERATURE")?);
        merge(&mut self.llm.timeout_secs, env_number("COURSEBOT_LLM_TIMEOUT_SECS")?);

        merge_optional(
            &mut self.sheets.spreadsheet_id,
            read_env("COURSEBOT_SHEETS_SPREADSHEET_ID"),
        );
        merge(&mut self.sheets.sheet_name, read_env("COURSEBOT_SHEETS_SHEET_NAME"));
        merge_secret(&mut self.sheets.access_token, read_env("COURSEBOT_SHEETS_ACCESS_TOKEN"));
        merge(&mut self.sheets.base_url, read_env("COURSEBOT_SHEETS_BASE_URL"));
        merge(&mut self.sheets.timeout_secs, env_number("COURSEBOT_SHEETS_TIMEOUT_SECS")?);

        if let Some(mode) = read_env("COURSEBOT_CHAT_MODE") {
            self.chat.mode = mode.parse()?;
        }
        merge(&mut self.chat.idle_ttl_secs, env_number("COURSEBOT_CHAT_IDLE_TTL_SECS")?);
        merge(&mut self.chat.max_conversations, env_number("COURSEBOT_CHAT_MAX_CONVERSATIONS")?);
        merge(
            &mut self.chat.sweep_interval_secs,
            env_number("COURSEBOT_CHAT_SWEEP_INTERVAL_SECS")?,
        );

        merge(&mut self.server.bind_address, read_env("COURSEBOT_SERVER_BIND_ADDRESS"));
        merge(&mut self.server.port, env_number("COURSEBOT_SERVER_PORT")?);
        merge(
            &mut self.server.static_dir,
            read_env("COURSEBOT_SERVER_STATIC_DIR").map(PathBuf::from),
        );
        merge(
            &mut self.server.graceful_shutdown_secs,
            env_number("COURSEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
        );

        merge(
            &mut self.logging.level,
            read_env("COURSEBOT_LOGGING_LEVEL").or_else(|| read_env("COURSEBOT_LOG_LEVEL")),
        );
        let log_format =
            read_env("COURSEBOT_LOGGING_FORMAT").or_else(|| read_env("COURSEBOT_LOG_FORMAT"));
        if let Some(format) = log_format {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        merge(&mut self.logging.level, overrides.log_level);
        merge(&mut self.llm.provider, overrides.llm_provider);
        merge_secret(&mut self.llm.api_key, overrides.llm_api_key);
        merge_optional(&mut self.llm.base_url, overrides.llm_base_url);
        merge(&mut self.llm.model, overrides.llm_model);
        merge(&mut self.chat.mode, overrides.chat_mode);
        merge_optional(&mut self.sheets.spreadsheet_id, overrides.sheets_spreadsheet_id);
        merge_secret(&mut self.sheets.access_token, overrides.sheets_access_token);
        merge(&mut self.sheets.base_url, overrides.sheets_base_url);
        merge(&mut self.server.bind_address, overrides.bind_address);
        merge(&mut self.server.port, overrides.port);
        merge(&mut self.course.name, overrides.course_name);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_sheets(&self.sheets)?;
        validate_chat(&self.chat)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_course(&self.course)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("coursebot.toml"), PathBuf::from("config/coursebot.toml")]
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

/// Expands `${VAR}` from the process environment. Comment lines are copied
/// untouched. A reference to an unset variable is an error rather than an
/// empty string.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            interpolate_line(line, &mut output)?;
        }
    }
    Ok(output)
}

fn interpolate_line(line: &str, output: &mut String) -> Result<(), ConfigError> {
    let mut rest = line;
    while let Some(open) = rest.find("${") {
        output.push_str(&rest[..open]);
        let tail = &rest[open + 2..];
        let close = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &tail[..close];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &tail[close + 1..];
    }
    output.push_str(rest);
    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{field} must start with http:// or https://")));
    }
    Ok(())
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
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if let Some(base_url) = llm.base_url.as_deref().filter(|value| !value.trim().is_empty()) {
        validate_http_url("llm.base_url", base_url)?;
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.timeout_secs == 0 || sheets.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sheets.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if sheets.sheet_name.trim().is_empty() {
        return Err(ConfigError::Validation("sheets.sheet_name must not be empty".to_string()));
    }
    validate_http_url("sheets.base_url", &sheets.base_url)
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "chat.idle_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if chat.max_conversations == 0 {
        return Err(ConfigError::Validation(
            "chat.max_conversations must be greater than zero".to_string(),
        ));
    }
    if chat.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "chat.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn validate_course(course: &CourseInfo) -> Result<(), ConfigError> {
    if course.name.trim().is_empty() {
        return Err(ConfigError::Validation("course.name must not be empty".to_string()));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    read_env(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn merge_optional<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn merge_secret(slot: &mut Option<SecretString>, value: Option<String>) {
    if let Some(value) = value {
        *slot = Some(SecretString::from(value));
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    sheets: Option<SheetsPatch>,
    chat: Option<ChatPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    course: Option<CoursePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    sheet_name: Option<String>,
    access_token: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    mode: Option<ChatMode>,
    idle_ttl_secs: Option<u64>,
    max_conversations: Option<usize>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    static_dir: Option<PathBuf>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct CoursePatch {
    name: Option<String>,
    duration: Option<String>,
    price: Option<String>,
    instructor: Option<String>,
    format: Option<String>,
    schedule: Option<String>,
    description: Option<String>,
    benefits: Option<Vec<String>>,
    prerequisites: Option<String>,
    support: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        credential_present, AppConfig, ChatMode, ConfigError, ConfigOverrides, LlmProvider,
        LoadOptions, LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: [&str; 8] = [
        "COURSEBOT_LLM_API_KEY",
        "OPENAI_API_KEY",
        "COURSEBOT_CHAT_MODE",
        "COURSEBOT_SERVER_PORT",
        "COURSEBOT_LOG_LEVEL",
        "COURSEBOT_LOG_FORMAT",
        "COURSEBOT_SHEETS_SPREADSHEET_ID",
        "COURSEBOT_SHEETS_ACCESS_TOKEN",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
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

    #[test]
    fn defaults_validate_without_any_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.llm.is_configured(), "llm should be unconfigured by default")?;
        ensure(!config.sheets.is_configured(), "sheets should be unconfigured by default")?;
        ensure(config.chat.mode == ChatMode::Model, "default mode should be model")?;
        ensure(config.server.port == 8000, "default port should be 8000")?;
        ensure(
            config.course.name == "Complete Python Development Bootcamp",
            "default course should be loaded",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("TEST_COURSEBOT_LLM_KEY", "sk-from-env");
        env::set_var("TEST_COURSEBOT_SHEETS_TOKEN", "ya29.from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("coursebot.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_COURSEBOT_LLM_KEY}"

[sheets]
spreadsheet_id = "sheet-123"
access_token = "${TEST_COURSEBOT_SHEETS_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
            ensure(
                api_key.as_deref() == Some("sk-from-env"),
                "llm api key should be loaded from environment",
            )?;
            ensure(config.llm.is_configured(), "llm should count as configured")?;
            ensure(config.sheets.is_configured(), "sheets should count as configured")?;
            Ok(())
        })();

        clear_vars(&["TEST_COURSEBOT_LLM_KEY", "TEST_COURSEBOT_SHEETS_TOKEN"]);
        result
    }

    #[test]
    fn shipped_example_loads_without_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../coursebot.example.toml");
        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("example config should load: {err}"))?;

        ensure(!config.llm.is_configured(), "example carries no api key")?;
        ensure(!config.sheets.is_configured(), "example carries no spreadsheet token")?;
        ensure(config.server.port == 8000, "example port should be read")
    }

    #[test]
    fn interpolation_skips_comment_lines() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("coursebot.toml");
        fs::write(
            &path,
            "# `${UNSET_COURSEBOT_VAR}` in a comment is left alone\n  # ${ALSO_UNSET}\n[server]\nport = 9200\n",
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.server.port == 9200, "values after comments should load")
    }

    #[test]
    fn course_table_overrides_selected_fields() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("coursebot.toml");
        fs::write(
            &path,
            r#"
[course]
name = "Rust for Backend Engineers"
price = "$499"
benefits = ["Ship an async service", "Code review sessions"]
"#,
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.course.name == "Rust for Backend Engineers", "name should be overridden")?;
        ensure(config.course.price == "$499", "price should be overridden")?;
        ensure(config.course.benefits.len() == 2, "benefits should be replaced")?;
        ensure(config.course.instructor == "John Smith", "untouched fields keep defaults")
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("COURSEBOT_LOG_LEVEL", "warn");
        env::set_var("COURSEBOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("COURSEBOT_SERVER_PORT", "9100");
        env::set_var("COURSEBOT_CHAT_MODE", "canned");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("coursebot.toml");
            fs::write(
                &path,
                r#"
[server]
port = 9000
bind_address = "0.0.0.0"

[llm]
provider = "ollama"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    chat_mode: Some(ChatMode::Model),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9100, "env port should win over file")?;
            ensure(config.server.bind_address == "0.0.0.0", "file bind address should apply")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.chat.mode == ChatMode::Model, "override chat mode should win over env")?;
            ensure(config.llm.provider == LlmProvider::Ollama, "file provider should apply")?;
            ensure(config.llm.is_configured(), "ollama needs no api key")?;
            Ok(())
        })();

        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("COURSEBOT_SERVER_PORT", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("server.port")
            );
            ensure(has_message, "validation failure should mention server.port")
        })();

        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn placeholder_credentials_do_not_count_as_configured() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("OPENAI_API_KEY", "your-openai-api-key-here");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(!config.llm.is_configured(), "placeholder key must not count as configured")
        })();

        clear_vars(&MANAGED_VARS);
        result?;

        ensure(!credential_present(None), "missing value is not a credential")?;
        ensure(!credential_present(Some("  ")), "blank value is not a credential")?;
        ensure(!credential_present(Some("<spreadsheet-id>")), "angle placeholder is rejected")?;
        ensure(credential_present(Some("sk-live-123")), "real-looking key is accepted")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("COURSEBOT_LLM_API_KEY", "sk-secret-value");
        env::set_var("COURSEBOT_SHEETS_ACCESS_TOKEN", "ya29.secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                !debug.contains("ya29.secret-value"),
                "debug output should not contain sheets token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&MANAGED_VARS);
        result
    }
}
