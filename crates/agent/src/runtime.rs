use std::sync::Arc;

use chrono::{DateTime, Utc};
use coursebot_core::domain::conversation::{validate_chat_input, Exchange};
use coursebot_core::errors::DomainError;
use tracing::info;

use crate::prompt;
use crate::router::{ResponseRouter, RouteKind};
use crate::store::{ConversationStore, TurnLocks};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    pub context_length: usize,
    pub route: RouteKind,
}

/// Owns the chat turn: lock the key, route, append.
pub struct ChatRuntime {
    router: ResponseRouter,
    store: Arc<dyn ConversationStore>,
    turns: TurnLocks,
}

impl ChatRuntime {
    /// `store` must be the same store the router reads from.
    pub fn new(router: ResponseRouter, store: Arc<dyn ConversationStore>) -> Self {
        Self { router, store, turns: TurnLocks::default() }
    }

    pub fn router(&self) -> &ResponseRouter {
        &self.router
    }

    /// Restarts the conversation for `user_id`. The message body is ignored;
    /// the stored exchange is always the start command and its welcome.
    pub async fn start(&self, user_id: &str) -> Result<ChatReply, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::InvalidMessage {
                field: "user_id",
                reason: "must not be blank",
            });
        }

        let _turn = self.turns.acquire(user_id).await;
        let welcome = prompt::start_welcome(&self.router.catalog().course);
        self.store.clear(user_id).await;
        let context_length = self.store.append(user_id, prompt::START_COMMAND, &welcome).await;

        info!(
            event_name = "chat.conversation.started",
            user_id,
            context_length,
            "conversation restarted"
        );

        Ok(ChatReply { response: welcome, context_length, route: RouteKind::Greeting })
    }

    pub async fn chat(&self, user_id: &str, message: &str) -> Result<ChatReply, DomainError> {
        validate_chat_input(user_id, message)?;

        let _turn = self.turns.acquire(user_id).await;
        let reply = self.router.respond(user_id, message).await;
        let context_length = self.store.append(user_id, message, &reply.text).await;

        info!(
            event_name = "chat.turn.completed",
            user_id,
            route = reply.route.as_str(),
            context_length,
            "chat turn completed"
        );

        Ok(ChatReply { response: reply.text, context_length, route: reply.route })
    }

    /// Appends an exchange produced outside the router (for example a
    /// registration confirmation).
    pub async fn record_exchange(
        &self,
        user_id: &str,
        user_message: &str,
        bot_message: &str,
    ) -> usize {
        let _turn = self.turns.acquire(user_id).await;
        self.store.append(user_id, user_message, bot_message).await
    }

    pub async fn history(&self, user_id: &str) -> Vec<Exchange> {
        self.store.get(user_id).await
    }

    /// Evicts idle conversations and releases their turn locks.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let evicted = self.store.evict_idle(now).await;
        let released = self.turns.prune().await;
        if evicted > 0 {
            info!(
                event_name = "chat.store.swept",
                evicted,
                released_locks = released,
                "idle conversations evicted"
            );
        }
        evicted
    }

    pub async fn conversation_count(&self) -> usize {
        self.store.conversation_count().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use coursebot_core::catalog::{CourseCatalog, CourseInfo};
    use coursebot_core::config::ChatMode;
    use coursebot_core::errors::DomainError;

    use super::ChatRuntime;
    use crate::llm::{ChatTurn, LlmClient, LlmError};
    use crate::prompt;
    use crate::router::{ResponseRouter, RouteKind};
    use crate::store::{ConversationStore, InMemoryConversationStore, StoreLimits};

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, turns: &[ChatTurn]) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(format!("seen {} turns", turns.len()))
        }
    }

    fn runtime_with(store: Arc<InMemoryConversationStore>, mode: ChatMode) -> ChatRuntime {
        let catalog = CourseCatalog::new(CourseInfo::default()).expect("default catalog");
        let router = ResponseRouter::new(Arc::new(catalog), store.clone(), mode);
        ChatRuntime::new(router, store)
    }

    fn runtime(mode: ChatMode) -> ChatRuntime {
        runtime_with(Arc::new(InMemoryConversationStore::default()), mode)
    }

    #[tokio::test]
    async fn start_then_chat_yields_context_length_one_then_two() {
        let runtime = runtime(ChatMode::Model);
        runtime.chat("user-1", "price?").await.expect("chat");
        runtime.chat("user-1", "duration?").await.expect("chat");

        let started = runtime.start("user-1").await.expect("start");
        assert_eq!(started.context_length, 1);
        assert!(started.response.contains(&runtime.router().catalog().course.name));

        let history = runtime.history("user-1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_message, prompt::START_COMMAND);

        let reply = runtime.chat("user-1", "price?").await.expect("chat");
        assert_eq!(reply.context_length, 2);
    }

    #[tokio::test]
    async fn many_chats_keep_five_most_recent_in_order() {
        let runtime = runtime(ChatMode::Canned);

        for index in 0..8 {
            let reply = runtime.chat("user-1", &format!("question {index}")).await.expect("chat");
            assert!(reply.context_length <= 5);
        }

        let messages = runtime
            .history("user-1")
            .await
            .into_iter()
            .map(|exchange| exchange.user_message)
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            vec!["question 3", "question 4", "question 5", "question 6", "question 7"]
        );
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_routing() {
        let runtime = runtime(ChatMode::Model);

        let error = runtime.chat("user-1", "   ").await.expect_err("blank message");
        assert!(matches!(error, DomainError::InvalidMessage { field: "message", .. }));
        assert!(matches!(
            runtime.start("").await,
            Err(DomainError::InvalidMessage { field: "user_id", .. })
        ));
        assert_eq!(runtime.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_turns_for_one_key_see_each_other() {
        let store = Arc::new(InMemoryConversationStore::default());
        let router = ResponseRouter::new(
            Arc::new(CourseCatalog::new(CourseInfo::default()).expect("default catalog")),
            store.clone(),
            ChatMode::Model,
        )
        .with_completion(Arc::new(EchoClient), Duration::from_secs(1));
        let runtime = Arc::new(ChatRuntime::new(router, store));
        runtime.record_exchange("user-1", "hello", "welcome").await;

        let mut handles = Vec::new();
        for index in 0..3 {
            let runtime = Arc::clone(&runtime);
            handles.push(tokio::spawn(async move {
                runtime.chat("user-1", &format!("open question {index}")).await
            }));
        }
        let mut replies = Vec::new();
        for handle in handles {
            replies.push(handle.await.expect("join").expect("chat").response);
        }

        replies.sort();
        assert_eq!(replies, vec!["seen 4 turns", "seen 6 turns", "seen 8 turns"]);
        assert_eq!(runtime.history("user-1").await.len(), 4);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_conversations() {
        let store = Arc::new(InMemoryConversationStore::new(StoreLimits {
            idle_ttl: chrono::Duration::minutes(5),
            max_conversations: 10,
        }));
        let runtime = runtime_with(store.clone(), ChatMode::Canned);
        runtime.chat("user-1", "price?").await.expect("chat");

        assert_eq!(runtime.sweep(Utc::now()).await, 0);
        assert_eq!(runtime.sweep(Utc::now() + chrono::Duration::minutes(6)).await, 1);
        assert!(store.get("user-1").await.is_empty());
    }

    #[tokio::test]
    async fn greeting_route_is_reported() {
        let runtime = runtime(ChatMode::Model);

        let reply = runtime.chat("user-2", "hello").await.expect("chat");

        assert_eq!(reply.route, RouteKind::Greeting);
        assert_eq!(reply.context_length, 1);
    }
}
