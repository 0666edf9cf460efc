use coursebot_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::{chat_runtime, current_thread_runtime, CommandResult};

#[derive(Debug, Serialize)]
struct AskOutcome<'a> {
    command: &'static str,
    status: &'static str,
    mode: &'static str,
    route: &'static str,
    user: &'a str,
    response: String,
}

/// One routed reply under the configured mode. Open questions reach the
/// completion service only in model mode with a key configured.
pub fn run(message: &str, user: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2)
        }
    };

    let chat = match chat_runtime(&config) {
        Ok(chat) => chat,
        Err(error) => {
            return CommandResult::failure("ask", error.error_class(), error.to_string(), 3)
        }
    };
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("ask", "runtime", error.to_string(), 4),
    };

    let reply = match runtime.block_on(chat.chat(user, message)) {
        Ok(reply) => reply,
        Err(error) => return CommandResult::failure("ask", "invalid_input", error.to_string(), 2),
    };

    let outcome = AskOutcome {
        command: "ask",
        status: "ok",
        mode: config.chat.mode.as_str(),
        route: reply.route.as_str(),
        user,
        response: reply.response,
    };
    match serde_json::to_string(&outcome) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("ask", "serialization", error.to_string(), 5),
    }
}
