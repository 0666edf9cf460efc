use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Number of exchanges retained per conversation.
pub const MAX_EXCHANGES: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    #[serde(rename = "user")]
    pub user_message: String,
    #[serde(rename = "assistant")]
    pub bot_message: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub fn at(
        user_message: impl Into<String>,
        bot_message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { user_message: user_message.into(), bot_message: bot_message.into(), created_at }
    }
}

/// Rejects chat input that cannot be attributed to a conversation.
pub fn validate_chat_input(user_id: &str, message: &str) -> Result<(), DomainError> {
    if user_id.trim().is_empty() {
        return Err(DomainError::InvalidMessage { field: "user_id", reason: "must not be blank" });
    }
    if message.trim().is_empty() {
        return Err(DomainError::InvalidMessage { field: "message", reason: "must not be blank" });
    }
    Ok(())
}

/// Most recent exchanges for one conversation, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationHistory {
    exchanges: VecDeque<Exchange>,
    last_active: DateTime<Utc>,
}

impl ConversationHistory {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self { exchanges: VecDeque::with_capacity(MAX_EXCHANGES + 1), last_active: created_at }
    }

    /// Appends `exchange` and drops the oldest entries beyond [`MAX_EXCHANGES`].
    /// Returns the resulting length.
    pub fn push(&mut self, exchange: Exchange) -> usize {
        if exchange.created_at > self.last_active {
            self.last_active = exchange.created_at;
        }
        self.exchanges.push_back(exchange);
        while self.exchanges.len() > MAX_EXCHANGES {
            self.exchanges.pop_front();
        }
        debug_assert!(self.exchanges.len() <= MAX_EXCHANGES);
        self.exchanges.len()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_active) > ttl
    }
}
