use std::sync::Arc;
use std::time::Duration;

use coursebot_core::catalog::{CourseCatalog, FaqEntry, FaqTable};
use coursebot_core::config::ChatMode;
use coursebot_core::domain::conversation::Exchange;
use serde::Serialize;
use tracing::warn;

use crate::llm::{ChatTurn, LlmClient, LlmError};
use crate::prompt;
use crate::store::ConversationStore;

/// Which rule produced a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Greeting,
    Faq,
    Completion,
    CompletionUnavailable,
    CompletionFailed,
    Canned,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Faq => "faq",
            Self::Completion => "completion",
            Self::CompletionUnavailable => "completion_unavailable",
            Self::CompletionFailed => "completion_failed",
            Self::Canned => "canned",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutedReply {
    pub text: String,
    pub route: RouteKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision<'a> {
    Greeting,
    Faq(&'a FaqEntry),
    Fallback,
}

/// Pure part of routing: greeting, then FAQ, then fallback.
pub fn decide<'a>(faqs: &'a FaqTable, history_is_empty: bool, message: &str) -> Decision<'a> {
    if history_is_empty && prompt::is_greeting(message) {
        return Decision::Greeting;
    }
    match faqs.match_message(message) {
        Some(entry) => Decision::Faq(entry),
        None => Decision::Fallback,
    }
}

/// System prompt, then each stored exchange as a user/assistant pair, then the
/// current message.
pub fn completion_turns(
    catalog: &CourseCatalog,
    history: &[Exchange],
    message: &str,
) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() * 2 + 2);
    turns.push(ChatTurn::system(prompt::system_prompt(&catalog.course)));
    for exchange in history {
        turns.push(ChatTurn::user(exchange.user_message.clone()));
        turns.push(ChatTurn::assistant(exchange.bot_message.clone()));
    }
    turns.push(ChatTurn::user(message));
    turns
}

pub struct ResponseRouter {
    catalog: Arc<CourseCatalog>,
    store: Arc<dyn ConversationStore>,
    mode: ChatMode,
    completion: Option<Arc<dyn LlmClient>>,
    completion_timeout: Duration,
}

impl ResponseRouter {
    pub fn new(
        catalog: Arc<CourseCatalog>,
        store: Arc<dyn ConversationStore>,
        mode: ChatMode,
    ) -> Self {
        Self { catalog, store, mode, completion: None, completion_timeout: Duration::from_secs(30) }
    }

    pub fn with_completion(mut self, client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        self.completion = Some(client);
        self.completion_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    pub fn completion_configured(&self) -> bool {
        self.completion.is_some()
    }

    /// Chooses a reply for `message` given the stored history of `key`. Never
    /// fails and never writes to the store.
    pub async fn respond(&self, key: &str, message: &str) -> RoutedReply {
        let history = self.store.get(key).await;
        self.respond_with_history(&history, message).await
    }

    pub async fn respond_with_history(&self, history: &[Exchange], message: &str) -> RoutedReply {
        match decide(&self.catalog.faqs, history.is_empty(), message) {
            Decision::Greeting => RoutedReply {
                text: prompt::greeting_reply(&self.catalog.course),
                route: RouteKind::Greeting,
            },
            Decision::Faq(entry) => {
                RoutedReply { text: entry.answer.clone(), route: RouteKind::Faq }
            }
            Decision::Fallback => self.fallback(history, message).await,
        }
    }

    async fn fallback(&self, history: &[Exchange], message: &str) -> RoutedReply {
        if self.mode == ChatMode::Canned {
            return RoutedReply { text: prompt::canned_fallback(message), route: RouteKind::Canned };
        }

        let Some(client) = &self.completion else {
            return RoutedReply {
                text: prompt::APOLOGY_UNAVAILABLE.to_string(),
                route: RouteKind::CompletionUnavailable,
            };
        };

        let turns = completion_turns(&self.catalog, history, message);
        let outcome = tokio::time::timeout(self.completion_timeout, client.complete(&turns))
            .await
            .unwrap_or(Err(LlmError::Timeout(self.completion_timeout)));

        match outcome {
            Ok(text) if text.trim().is_empty() => RoutedReply {
                text: prompt::EMPTY_COMPLETION.to_string(),
                route: RouteKind::Completion,
            },
            Ok(text) => RoutedReply { text: text.trim().to_string(), route: RouteKind::Completion },
            Err(error) => {
                warn!(
                    event_name = "chat.completion.failed",
                    error = %error,
                    "completion call failed, replying with apology"
                );
                RoutedReply {
                    text: prompt::APOLOGY_FAILURE.to_string(),
                    route: RouteKind::CompletionFailed,
                }
            }
        }
    }
}
