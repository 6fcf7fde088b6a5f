//! In-memory session store. Sessions live as long as the process.

use async_trait::async_trait;
use chatptk_core::session::{SessionGuard, SessionId, SessionSlot, SessionState, SessionStore};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

struct Entry {
    slot: SessionSlot,
    last_seen: DateTime<Utc>,
}

impl Entry {
    /// Someone besides the map holds the slot: a guard or a waiter.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.slot) > 1
    }
}

/// A session store backed by a `HashMap`.
///
/// Sessions idle longer than `ttl` are dropped on the next access, and
/// the least recently seen session is evicted once `max_sessions` is reached.
/// A session with a turn in flight (or queued) is never evicted or purged, so
/// the store may briefly exceed `max_sessions`.
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<SessionId, Entry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new(ttl: std::time::Duration, max_sessions: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &chatptk_config::SessionConfig) -> Self {
        Self::new(
            std::time::Duration::from_secs(config.ttl_minutes.saturating_mul(60)),
            config.max_sessions,
        )
    }

    /// Drop every session idle past the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !self.is_expired(e, now) || e.is_busy());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
        removed
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.last_seen >= self.ttl
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::from_config(&chatptk_config::SessionConfig::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn acquire(&self, id: &SessionId) -> SessionGuard {
        let slot = {
            let now = Utc::now();
            let mut entries = self.entries.write().await;

            if entries
                .get(id)
                .is_some_and(|e| self.is_expired(e, now) && !e.is_busy())
            {
                entries.remove(id);
            }

            // Evict the stalest idle session if at capacity
            if entries.len() >= self.max_sessions && !entries.contains_key(id) {
                if let Some(oldest_key) = entries
                    .iter()
                    .filter(|(_, e)| !e.is_busy())
                    .min_by_key(|(_, e)| e.last_seen)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest_key);
                }
            }

            let entry = entries.entry(id.clone()).or_insert_with(|| Entry {
                slot: Arc::new(Mutex::new(None)),
                last_seen: now,
            });
            entry.last_seen = now;
            entry.slot.clone()
        };

        // Map lock released before waiting on the session itself
        slot.lock_owned().await
    }

    async fn get(&self, id: &SessionId) -> Option<SessionState> {
        let slot = {
            let entries = self.entries.read().await;
            let entry = entries.get(id)?;
            if self.is_expired(entry, Utc::now()) {
                return None;
            }
            entry.slot.clone()
        };
        let state = slot.lock().await;
        state.clone()
    }

    async fn expire(&self, id: &SessionId) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !self.is_expired(e, now))
            .count()
    }
}
