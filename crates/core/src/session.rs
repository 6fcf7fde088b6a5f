//! Per-client session state and the store that owns it.
//!
//! Session state is ephemeral: it lives as long as the store keeps it.
//! Access is serialized per session by handing out an owned async mutex
//! guard, so one turn's read-then-write cannot interleave with another
//! turn on the same session. Different sessions never share a lock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Opaque identifier for a client session (the unsigned cookie payload).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turn memory replayed into the next prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// The question the tutor asked most recently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_question: Option<String>,

    /// What the tutor expects the student to answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<String>,
}

impl SessionState {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            last_question: Some(question.into()),
            expected_answer: Some(answer.into()),
        }
    }
}

/// Exclusive handle on one session's slot.
///
/// `None` until the first turn creates the state. Dropping the guard
/// releases the session for the next queued request.
pub type SessionGuard = OwnedMutexGuard<Option<SessionState>>;

/// Shared slot for one session.
pub type SessionSlot = Arc<Mutex<Option<SessionState>>>;

/// Key-value store of session state, injected into the pipeline.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A human-readable backend name.
    fn name(&self) -> &str;

    /// Lock the session's slot, creating an empty one if needed.
    ///
    /// Waits while another turn on the same session holds the guard.
    async fn acquire(&self, id: &SessionId) -> SessionGuard;

    /// Snapshot of the stored state, without holding the lock.
    async fn get(&self, id: &SessionId) -> Option<SessionState>;

    /// Overwrite the stored state.
    async fn set(&self, id: &SessionId, state: SessionState) {
        let mut guard = self.acquire(id).await;
        *guard = Some(state);
    }

    /// Forget a session. Returns whether it existed.
    async fn expire(&self, id: &SessionId) -> bool;

    /// Number of live sessions.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
