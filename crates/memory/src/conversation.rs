//! Conversation memory: bounded, idle-evicting history per conversation.
//!
//! Each conversation keeps at most `capacity` messages; older ones fall off
//! the front. Conversations nobody has written to for longer than the idle
//! threshold are dropped by [`ConversationMemory::sweep_idle`], which the
//! background sweeper calls on a fixed interval. Nothing is persisted.

use chrono::{DateTime, Utc};
use parley_core::error::{Error, Result};
use parley_core::message::{ConversationId, Message, Role};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Default messages kept per conversation.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default idle time after which a conversation is evicted.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct ConversationRecord {
    messages: VecDeque<Message>,
    last_activity: DateTime<Utc>,
}

/// Aggregate counts across all live conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub conversations: usize,
    pub total_messages: usize,
}

/// Held for the duration of one turn; see [`ConversationMemory::lock_turn`].
#[must_use = "the turn is only serialized while the guard is held"]
pub struct TurnGuard {
    _guard: OwnedMutexGuard<()>,
}

type TurnLock = Arc<tokio::sync::Mutex<()>>;

/// In-process store of recent messages, keyed by conversation.
pub struct ConversationMemory {
    capacity: usize,
    idle_threshold: Duration,
    records: RwLock<HashMap<ConversationId, ConversationRecord>>,
    turn_locks: Mutex<HashMap<ConversationId, TurnLock>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ConversationMemory {
    /// Create a store keeping at most `capacity` messages per conversation
    /// (values below 1 are raised to 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            records: RwLock::new(HashMap::new()),
            turn_locks: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// Set the idle threshold used by the background sweeper.
    pub fn with_idle_threshold(mut self, threshold: Duration) -> Self {
        self.idle_threshold = threshold;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    /// Append a message, creating the conversation if needed and trimming
    /// the oldest entries beyond capacity.
    pub async fn add_message(&self, id: &ConversationId, role: Role, content: impl Into<String>) {
        self.insert_at(id, Message::new(role, content), Utc::now())
            .await;
    }

    async fn insert_at(&self, id: &ConversationId, message: Message, at: DateTime<Utc>) {
        let mut records = self.records.write().await;
        let record = records
            .entry(id.clone())
            .or_insert_with(|| ConversationRecord {
                messages: VecDeque::with_capacity(self.capacity),
                last_activity: at,
            });

        record.messages.push_back(message);
        record.last_activity = at;
        while record.messages.len() > self.capacity {
            record.messages.pop_front();
        }

        debug!(conversation = %id, messages = record.messages.len(), "Message added");
    }

    /// An independent copy of the conversation's history, oldest first.
    /// Unknown conversations yield an empty history.
    pub async fn history(&self, id: &ConversationId) -> Vec<Message> {
        self.records
            .read()
            .await
            .get(id)
            .map(|record| record.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget a conversation. Returns whether it existed.
    pub async fn clear(&self, id: &ConversationId) -> bool {
        let existed = self.records.write().await.remove(id).is_some();
        if existed {
            info!(conversation = %id, "Conversation memory cleared");
        }
        existed
    }

    pub async fn stats(&self) -> MemoryStats {
        let records = self.records.read().await;
        MemoryStats {
            conversations: records.len(),
            total_messages: records.values().map(|r| r.messages.len()).sum(),
        }
    }

    /// Evict every conversation idle for strictly longer than `threshold`
    /// as of `now`. Returns how many were evicted.
    pub async fn sweep_idle(&self, now: DateTime<Utc>, threshold: Duration) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| {
            !now.signed_duration_since(record.last_activity)
                .to_std()
                .is_ok_and(|idle| idle > threshold)
        });
        let evicted = before - records.len();

        if evicted > 0 {
            info!(evicted, remaining = records.len(), "Evicted idle conversations");
        }
        evicted
    }

    /// Serialize turns for one conversation.
    ///
    /// Waits until no other holder exists for `id`, then returns a guard.
    /// Turns for different conversations never wait on each other.
    pub async fn lock_turn(&self, id: &ConversationId) -> TurnGuard {
        let lock = {
            let mut locks = lock_unpoisoned(&self.turn_locks);
            // Entries only the map still references are idle.
            locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
            locks.entry(id.clone()).or_default().clone()
        };

        TurnGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Start evicting idle conversations every `interval`, replacing any
    /// sweeper already running. Must be called within a tokio runtime.
    ///
    /// A zero interval is rejected and leaves any running sweeper untouched.
    /// The sweeper holds only a weak reference and stops by itself once the
    /// store is dropped.
    pub fn start_idle_sweep(self: &Arc<Self>, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::config("idle sweep interval must be greater than zero"));
        }

        let memory: Weak<Self> = Arc::downgrade(self);
        let threshold = self.idle_threshold;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(memory) = memory.upgrade() else {
                    debug!("Conversation memory dropped, stopping idle sweep");
                    return;
                };
                memory.sweep_idle(Utc::now(), threshold).await;
            }
        });

        if let Some(previous) = lock_unpoisoned(&self.sweeper).replace(handle) {
            previous.abort();
        }

        info!(
            interval_secs = interval.as_secs(),
            threshold_secs = threshold.as_secs(),
            "Idle sweep started"
        );
        Ok(())
    }

    /// Stop the background sweeper. Returns whether one was running.
    pub fn stop_idle_sweep(&self) -> bool {
        match lock_unpoisoned(&self.sweeper).take() {
            Some(handle) => {
                handle.abort();
                info!("Idle sweep stopped");
                true
            }
            None => false,
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Drop for ConversationMemory {
    fn drop(&mut self) {
        if let Some(handle) = lock_unpoisoned(&self.sweeper).take() {
            handle.abort();
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
