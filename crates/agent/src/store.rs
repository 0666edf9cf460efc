use std::collections::btree_map::BTreeMap;
use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use coursebot_core::config::ChatConfig;
use coursebot_core::domain::conversation::{ConversationHistory, Exchange};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Exchanges for `key`, oldest first. Empty when the key is unknown.
    async fn get(&self, key: &str) -> Vec<Exchange>;

    /// Appends one exchange and returns the resulting history length.
    async fn append(&self, key: &str, user_message: &str, bot_message: &str) -> usize;

    async fn clear(&self, key: &str);

    /// Drops histories idle past the store's TTL; returns how many were removed.
    async fn evict_idle(&self, now: DateTime<Utc>) -> usize;

    async fn conversation_count(&self) -> usize;
}

#[derive(Clone, Copy, Debug)]
pub struct StoreLimits {
    pub idle_ttl: Duration,
    pub max_conversations: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self { idle_ttl: Duration::hours(1), max_conversations: 10_000 }
    }
}

impl From<&ChatConfig> for StoreLimits {
    fn from(config: &ChatConfig) -> Self {
        let idle_ttl = i64::try_from(config.idle_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self { idle_ttl, max_conversations: config.max_conversations }
    }
}

/// Last activity plus an insertion sequence, unique per stored key.
type ActivityStamp = (DateTime<Utc>, u64);

struct Slot {
    history: ConversationHistory,
    stamp: ActivityStamp,
}

/// Histories keyed by conversation, indexed by last activity so the least
/// recently active key is found without a scan.
#[derive(Default)]
struct Conversations {
    slots: HashMap<String, Slot>,
    by_activity: BTreeMap<ActivityStamp, String>,
    next_seq: u64,
}

impl Conversations {
    fn push(&mut self, key: &str, exchange: Exchange) -> usize {
        let created_at = exchange.created_at;
        let slot = match self.slots.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                self.by_activity.remove(&slot.stamp);
                slot
            }
            Entry::Vacant(entry) => entry.insert(Slot {
                history: ConversationHistory::new(created_at),
                stamp: (created_at, 0),
            }),
        };

        let length = slot.history.push(exchange);
        self.next_seq += 1;
        slot.stamp = (slot.history.last_active(), self.next_seq);
        self.by_activity.insert(slot.stamp, key.to_string());
        length
    }

    fn remove(&mut self, key: &str) {
        if let Some(slot) = self.slots.remove(key) {
            self.by_activity.remove(&slot.stamp);
        }
    }

    fn pop_least_recent(&mut self) -> Option<String> {
        let (_, key) = self.by_activity.pop_first()?;
        self.slots.remove(&key);
        Some(key)
    }

    fn least_recent_activity(&self) -> Option<DateTime<Utc>> {
        self.by_activity.first_key_value().map(|((last_active, _), _)| *last_active)
    }
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<Conversations>,
    limits: StoreLimits,
}

impl InMemoryConversationStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self { conversations: RwLock::new(Conversations::default()), limits }
    }

    pub async fn append_at(
        &self,
        key: &str,
        user_message: &str,
        bot_message: &str,
        at: DateTime<Utc>,
    ) -> usize {
        let mut conversations = self.conversations.write().await;

        if !conversations.slots.contains_key(key)
            && conversations.slots.len() >= self.limits.max_conversations
        {
            if let Some(evicted_key) = conversations.pop_least_recent() {
                tracing::debug!(
                    event_name = "chat.store.capacity_evicted",
                    evicted_key = %evicted_key,
                    "conversation dropped to make room"
                );
            }
        }

        conversations.push(key, Exchange::at(user_message, bot_message, at))
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, key: &str) -> Vec<Exchange> {
        self.conversations
            .read()
            .await
            .slots
            .get(key)
            .map(|slot| slot.history.exchanges())
            .unwrap_or_default()
    }

    async fn append(&self, key: &str, user_message: &str, bot_message: &str) -> usize {
        self.append_at(key, user_message, bot_message, Utc::now()).await
    }

    async fn clear(&self, key: &str) {
        self.conversations.write().await.remove(key);
    }

    async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut conversations = self.conversations.write().await;
        let mut removed = 0;
        while conversations
            .least_recent_activity()
            .is_some_and(|last_active| now.signed_duration_since(last_active) > self.limits.idle_ttl)
        {
            conversations.pop_least_recent();
            removed += 1;
        }
        removed
    }

    async fn conversation_count(&self) -> usize {
        self.conversations.read().await.slots.len()
    }
}

/// Per-key async mutexes serialising read-respond-append chat turns.
#[derive(Default)]
pub struct TurnLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Forgets locks nobody holds or waits on.
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }
}
