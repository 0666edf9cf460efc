use std::time::Instant;

use coursebot_agent::router::RouteKind;
use coursebot_agent::runtime::ChatRuntime;
use coursebot_core::config::{AppConfig, ChatMode, LoadOptions};
use coursebot_core::domain::conversation::MAX_EXCHANGES;
use coursebot_core::domain::registration::RegistrationRecord;
use coursebot_sheets::recorder::{confirmation_message, RegistrationRecorder};
use serde::Serialize;

use super::{chat_runtime, current_thread_runtime, escape_json, CommandResult};

const SMOKE_USER: &str = "smoke";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

const FLOW_CHECKS: [&str; 4] =
    ["start_welcome", "faq_reply", "history_cap", "registration_fallback"];

/// Runs the chat flow in canned mode with no spreadsheet, so nothing leaves
/// the process.
pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let mut config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.extend(FLOW_CHECKS.into_iter().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    };
    config.chat.mode = ChatMode::Canned;

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: FLOW_CHECKS[0],
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.extend(FLOW_CHECKS[1..].iter().copied().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let chat = match chat_runtime(&config) {
        Ok(chat) => chat,
        Err(error) => {
            checks.push(SmokeCheck {
                name: FLOW_CHECKS[0],
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("chat runtime could not be built: {error}"),
            });
            checks.extend(FLOW_CHECKS[1..].iter().copied().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    };
    let recorder = RegistrationRecorder::new(None, config.course.name.clone());

    for name in FLOW_CHECKS {
        if checks.iter().any(|check| check.status == SmokeStatus::Fail) {
            checks.push(skipped(name));
            continue;
        }

        let result = timed_check(|| {
            runtime.block_on(async {
                match name {
                    "start_welcome" => check_start(&chat, &config).await,
                    "faq_reply" => check_faq(&chat, &config).await,
                    "history_cap" => check_history_cap(&chat).await,
                    _ => check_registration(&recorder).await,
                }
            })
        });
        checks.push(match result {
            Ok((elapsed_ms, message)) => {
                SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message }
            }
            Err((elapsed_ms, message)) => {
                SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message }
            }
        });
    }

    finalize_report(checks, elapsed_since(started))
}

async fn check_start(chat: &ChatRuntime, config: &AppConfig) -> Result<String, String> {
    let reply = chat.start(SMOKE_USER).await.map_err(|error| error.to_string())?;
    if reply.context_length != 1 {
        return Err(format!("expected a fresh history of 1, got {}", reply.context_length));
    }
    if !reply.response.contains(&config.course.name) {
        return Err("welcome does not mention the course".to_string());
    }
    Ok("welcome returned with a fresh history".to_string())
}

async fn check_faq(chat: &ChatRuntime, config: &AppConfig) -> Result<String, String> {
    let reply =
        chat.chat(SMOKE_USER, "What is the price?").await.map_err(|error| error.to_string())?;
    if reply.route != RouteKind::Faq || !reply.response.contains(&config.course.price) {
        return Err(format!("expected the price answer, got route `{}`", reply.route.as_str()));
    }
    Ok(format!("price answered locally; history at {}", reply.context_length))
}

async fn check_history_cap(chat: &ChatRuntime) -> Result<String, String> {
    let mut context_length = 0;
    for turn in 0..MAX_EXCHANGES {
        let reply = chat
            .chat(SMOKE_USER, &format!("Is there a waitlist? ({turn})"))
            .await
            .map_err(|error| error.to_string())?;
        context_length = reply.context_length;
    }

    let stored = chat.history(SMOKE_USER).await.len();
    if context_length != MAX_EXCHANGES || stored != MAX_EXCHANGES {
        return Err(format!(
            "expected history capped at {MAX_EXCHANGES}, reply said {context_length} and store holds {stored}"
        ));
    }
    Ok(format!("history capped at {MAX_EXCHANGES} exchanges"))
}

async fn check_registration(recorder: &RegistrationRecorder) -> Result<String, String> {
    let registration = RegistrationRecord {
        name: "Smoke Test".to_string(),
        email: "smoke@example.com".to_string(),
        phone: "+1-555-0000".to_string(),
        user_id: Some(SMOKE_USER.to_string()),
    };
    registration.validate().map_err(|error| error.to_string())?;

    let outcome = recorder.record(&registration).await;
    if outcome.accepted {
        return Err("registration reported saved without a spreadsheet".to_string());
    }
    let message = confirmation_message(&registration, recorder.course_name(), outcome);
    if !message.contains("We will contact you shortly") {
        return Err("confirmation does not carry the follow-up notice".to_string());
    }
    Ok("registration confirmed with the follow-up notice".to_string())
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
