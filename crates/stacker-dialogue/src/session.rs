//! Per-chat pending request storage and turn serialization.
//!
//! A chat has at most one [`PendingRequest`]. Callers get a clone, mutate
//! it, and write it back with `set`; the per-chat lock from [`ChatLocks`]
//! keeps that read-modify-write from interleaving with another update for
//! the same chat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use stacker_core::types::{ChatId, Timestamp};
use tracing::{debug, info};

use crate::error::DialogueError;
use crate::lifecycle::Phase;
use crate::types::PendingRequest;

/// Storage contract for pending requests.
pub trait SessionStore: Send + Sync {
    /// The chat's pending request, or `None` if there is none or it expired.
    fn get(&self, chat_id: ChatId) -> Result<Option<PendingRequest>, DialogueError>;
    fn set(&self, chat_id: ChatId, request: PendingRequest) -> Result<(), DialogueError>;
    /// Remove the chat's request. Returns whether one existed.
    fn clear(&self, chat_id: ChatId) -> Result<bool, DialogueError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store with an inactivity TTL.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<ChatId, PendingRequest>>,
    ttl_secs: u64,
}

impl InMemorySessionStore {
    pub fn new(ttl_minutes: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_secs: ttl_minutes.saturating_mul(60),
        }
    }

    fn is_expired(&self, request: &PendingRequest, now: Timestamp) -> bool {
        request.updated_at().seconds_until(now) > self.ttl_secs
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ChatId, PendingRequest>>, DialogueError> {
        self.sessions
            .lock()
            .map_err(|e| DialogueError::Internal(format!("session lock poisoned: {}", e)))
    }

    /// `get` as of `now`. Separate so expiry can be tested without sleeping.
    pub fn get_at(
        &self,
        chat_id: ChatId,
        now: Timestamp,
    ) -> Result<Option<PendingRequest>, DialogueError> {
        let mut sessions = self.lock()?;
        let expired = match sessions.get(&chat_id) {
            Some(request) => self.is_expired(request, now),
            None => return Ok(None),
        };
        if expired {
            if let Some(request) = sessions.remove(&chat_id) {
                info!(
                    chat_id = %chat_id,
                    intent = %request.intent(),
                    exit = %Phase::Expired,
                    "Pending request expired"
                );
            }
            return Ok(None);
        }
        Ok(sessions.get(&chat_id).cloned())
    }

    /// Drop every expired request. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, DialogueError> {
        let now = Timestamp::now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, request| !self.is_expired(request, now));
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, exit = %Phase::Expired, "Purged expired pending requests");
        }
        Ok(purged)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(15)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, chat_id: ChatId) -> Result<Option<PendingRequest>, DialogueError> {
        self.get_at(chat_id, Timestamp::now())
    }

    fn set(&self, chat_id: ChatId, mut request: PendingRequest) -> Result<(), DialogueError> {
        if !request.is_consistent() {
            return Err(DialogueError::Internal(format!(
                "refusing to store inconsistent {} request ({:?} with {} missing)",
                request.intent(),
                request.sub_state(),
                request.missing().len()
            )));
        }
        request.touch(Timestamp::now());
        debug!(chat_id = %chat_id, intent = %request.intent(), missing = request.missing().len(), "Session stored");
        self.lock()?.insert(chat_id, request);
        Ok(())
    }

    fn clear(&self, chat_id: ChatId) -> Result<bool, DialogueError> {
        Ok(self.lock()?.remove(&chat_id).is_some())
    }
}

// =============================================================================
// Per-chat locks
// =============================================================================

/// Hands out one async mutex per chat.
#[derive(Default)]
pub struct ChatLocks {
    locks: Mutex<HashMap<ChatId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chat's lock, created on first use.
    pub fn for_chat(&self, chat_id: ChatId) -> Result<Arc<tokio::sync::Mutex<()>>, DialogueError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| DialogueError::Internal(format!("chat lock map poisoned: {}", e)))?;
        Ok(locks.entry(chat_id).or_default().clone())
    }

    /// Forget locks nobody is holding or waiting on.
    pub fn prune(&self) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}
