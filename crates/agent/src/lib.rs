//! Chat side of the course assistant: completion client, prompt texts, the
//! bounded conversation store, the response router and the chat runtime that
//! ties a turn together.
//!
//! The router answers greetings and FAQ keywords locally and only falls back
//! to the completion service for open-ended questions. Completion failures
//! never surface as errors; they degrade to a fixed apology.

pub mod llm;
pub mod prompt;
pub mod router;
pub mod runtime;
pub mod store;

pub use llm::{ChatTurn, LlmClient, LlmError, OpenAiChatClient, Role};
pub use router::{ResponseRouter, RouteKind, RoutedReply};
pub use runtime::{ChatReply, ChatRuntime};
pub use store::{ConversationStore, InMemoryConversationStore, StoreLimits, TurnLocks};
