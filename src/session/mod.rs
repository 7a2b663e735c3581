// In-memory conversation history
// One bounded turn log per session id, sharded so different sessions never contend

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionHandle {
    turns: Mutex<VecDeque<Turn>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

/// Held while one request owns a session. Requests for the same session
/// queue on it; other sessions are unaffected.
pub type SessionGuard = OwnedMutexGuard<()>;

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    max_turns: usize,
}

impl Default for SessionStore {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl SessionStore {
    #[inline]
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    #[inline]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Wait until no other request holds `session_id`, creating the session if needed
    #[inline]
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let gate = Arc::clone(&self.handle(session_id).gate);
        gate.lock_owned().await
    }

    /// Append a turn, evicting the oldest turns beyond the limit
    #[inline]
    pub fn append(&self, session_id: &str, turn: Turn) {
        let handle = self.handle(session_id);
        let mut turns = handle.turns.lock().unwrap_or_else(PoisonError::into_inner);
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
        debug!("Session {} now holds {} turns", session_id, turns.len());
    }

    /// Turns in insertion order; unknown sessions are empty
    #[inline]
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.existing(session_id)
            .map(|handle| {
                handle
                    .turns
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[inline]
    pub fn clear(&self, session_id: &str) {
        if let Some(handle) = self.existing(session_id) {
            handle
                .turns
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            debug!("Cleared session {}", session_id);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn existing(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn handle(&self, session_id: &str) -> Arc<SessionHandle> {
        if let Some(handle) = self.existing(session_id) {
            return handle;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }
}
