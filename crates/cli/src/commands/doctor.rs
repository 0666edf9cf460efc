use coursebot_agent::llm::OpenAiChatClient;
use coursebot_core::config::{AppConfig, ChatMode, LoadOptions};
use coursebot_sheets::client::GoogleSheetsClient;
use serde::Serialize;

use super::escape_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

/// Skipped checks do not fail the report: a missing integration only
/// degrades replies.
fn build_report(loaded: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_completion(&config));
            checks.push(check_spreadsheet(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            for name in ["completion_readiness", "spreadsheet_readiness"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        let skipped = checks.iter().filter(|check| check.status == CheckStatus::Skipped).count();
        format!("doctor: readiness checks passed ({skipped} skipped)")
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_completion(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "completion_readiness";

    if config.chat.mode == ChatMode::Canned {
        return DoctorCheck {
            name: NAME,
            status: CheckStatus::Skipped,
            details: "canned mode never calls the completion service".to_string(),
        };
    }
    if !config.llm.is_configured() {
        return DoctorCheck {
            name: NAME,
            status: CheckStatus::Skipped,
            details: "no API key configured; open questions get the unavailable apology"
                .to_string(),
        };
    }

    match OpenAiChatClient::new(&config.llm) {
        Ok(client) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Pass,
            details: format!("model `{}` via {}", config.llm.model, client.endpoint()),
        },
        Err(error) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Fail,
            details: format!("completion client could not be built: {error}"),
        },
    }
}

fn check_spreadsheet(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "spreadsheet_readiness";

    if !config.sheets.is_configured() {
        return DoctorCheck {
            name: NAME,
            status: CheckStatus::Skipped,
            details: "spreadsheet id or access token missing; registrations are not saved"
                .to_string(),
        };
    }

    match GoogleSheetsClient::new(&config.sheets) {
        Ok(_) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Pass,
            details: format!("appending to sheet `{}`", config.sheets.sheet_name),
        },
        Err(error) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Fail,
            details: format!("spreadsheet client could not be built: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
