// src/services/session_store.rs
//
// In-memory store mapping chat ids to conversation transcripts. The provider
// holds no server-side state between calls; the transcript kept here is what
// gets replayed into each provider request.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat::ChatTurn;

struct SessionEntry {
    model: String,
    turns: Vec<ChatTurn>,
    last_active: Instant,
}

/// Owns the session map. Retention policy: entries idle longer than `ttl`
/// are pruned lazily on every access, and when `max_sessions` is reached the
/// least recently active entry is evicted to make room.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Creates a new session for the given model and returns its id.
    pub fn create(&self, model: impl Into<String>) -> Uuid {
        let mut sessions = self.lock();
        Self::prune_expired(&mut sessions, self.ttl);
        Self::evict_if_full(&mut sessions, self.max_sessions);

        let chat_id = Uuid::new_v4();
        sessions.insert(
            chat_id,
            SessionEntry {
                model: model.into(),
                turns: Vec::new(),
                last_active: Instant::now(),
            },
        );
        chat_id
    }

    /// Returns whether the session exists (and refreshes its activity clock).
    pub fn touch(&self, chat_id: Uuid) -> bool {
        let mut sessions = self.lock();
        Self::prune_expired(&mut sessions, self.ttl);
        match sessions.get_mut(&chat_id) {
            Some(entry) => {
                entry.last_active = Instant::now();
                true
            }
            None => false,
        }
    }

    /// The model configured for a session.
    pub fn model(&self, chat_id: Uuid) -> Result<String, AppError> {
        let mut sessions = self.lock();
        Self::prune_expired(&mut sessions, self.ttl);
        sessions
            .get(&chat_id)
            .map(|entry| entry.model.clone())
            .ok_or_else(|| Self::not_found(chat_id))
    }

    /// Appends a completed user/model exchange to the transcript.
    ///
    /// If the session was pruned or evicted while the provider call was in
    /// flight, the entry is restored under the same id so a successful reply
    /// is never dropped.
    pub fn append_exchange(
        &self,
        chat_id: Uuid,
        model: &str,
        user_text: impl Into<String>,
        model_text: impl Into<String>,
    ) {
        let mut sessions = self.lock();
        Self::prune_expired(&mut sessions, self.ttl);
        if !sessions.contains_key(&chat_id) {
            debug!(%chat_id, "Restoring session dropped mid-exchange");
            Self::evict_if_full(&mut sessions, self.max_sessions);
        }
        let entry = sessions.entry(chat_id).or_insert_with(|| SessionEntry {
            model: model.to_string(),
            turns: Vec::new(),
            last_active: Instant::now(),
        });
        entry.turns.push(ChatTurn::user(user_text));
        entry.turns.push(ChatTurn::model(model_text));
        entry.last_active = Instant::now();
    }

    /// The ordered transcript for a session.
    pub fn history(&self, chat_id: Uuid) -> Result<Vec<ChatTurn>, AppError> {
        let mut sessions = self.lock();
        Self::prune_expired(&mut sessions, self.ttl);
        sessions
            .get(&chat_id)
            .map(|entry| entry.turns.clone())
            .ok_or_else(|| Self::not_found(chat_id))
    }

    /// Deletes a session, returning whether it existed.
    pub fn delete(&self, chat_id: Uuid) -> bool {
        let mut sessions = self.lock();
        Self::prune_expired(&mut sessions, self.ttl);
        sessions.remove(&chat_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        // A poisoned lock means a panic while holding it; the map itself is
        // still structurally valid, so keep serving.
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn evict_if_full(sessions: &mut HashMap<Uuid, SessionEntry>, max_sessions: usize) {
        if sessions.len() < max_sessions {
            return;
        }
        if let Some(oldest) = sessions
            .iter()
            .min_by_key(|(_, entry)| entry.last_active)
            .map(|(id, _)| *id)
        {
            debug!(chat_id = %oldest, "Evicting least recently active session");
            sessions.remove(&oldest);
        }
    }

    fn prune_expired(sessions: &mut HashMap<Uuid, SessionEntry>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        sessions.retain(|id, entry| {
            let keep = now.duration_since(entry.last_active) < ttl;
            if !keep {
                debug!(chat_id = %id, "Pruning expired session");
            }
            keep
        });
    }

    fn not_found(chat_id: Uuid) -> AppError {
        AppError::NotFound(format!("Chat session {chat_id} not found"))
    }
}
