// Conversation memory
// Per-session turn history with per-key locking and optional LRU/TTL bounds


use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::providers::{ChatMessage, Role};

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }

    #[inline]
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// Ordered history of one session
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
    }
}

/// Shared handle to one session; holding its lock serializes requests on that key
pub type SessionRef = Arc<Mutex<Session>>;

/// Lock a session, recovering the history if a previous holder panicked
#[inline]
pub fn lock_session(session: &SessionRef) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Optional bounds on the number and age of sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions kept before the least recently used idle one is evicted
    pub max_sessions: Option<usize>,
    /// Idle sessions unused for longer than this are evicted
    pub idle_ttl: Option<Duration>,
}

#[derive(Debug)]
struct Slot {
    session: SessionRef,
    last_used: Instant,
}

impl Slot {
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.session) == 1
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_used.elapsed() > ttl
    }
}

/// Thread-safe map from session id to conversation history
///
/// The map lock is only held to look up or insert a handle. Turn lists are
/// guarded per session, so different sessions never contend.
#[derive(Debug)]
pub struct SessionStore {
    slots: Mutex<LruCache<String, Slot>>,
    limits: SessionLimits,
}

impl Default for SessionStore {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Unbounded store
    #[inline]
    pub fn new() -> Self {
        Self::with_limits(SessionLimits::default())
    }

    #[inline]
    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            slots: Mutex::new(LruCache::unbounded()),
            limits,
        }
    }

    #[inline]
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    fn slots(&self) -> MutexGuard<'_, LruCache<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the session for `session_id`, creating an empty one on first use
    #[inline]
    pub fn get_or_create(&self, session_id: &str) -> SessionRef {
        let mut slots = self.slots();
        self.evict_expired(&mut slots);

        if let Some(slot) = slots.get_mut(session_id) {
            slot.last_used = Instant::now();
            return Arc::clone(&slot.session);
        }

        debug!("Creating session {}", session_id);
        let session = SessionRef::default();
        slots.put(
            session_id.to_string(),
            Slot {
                session: Arc::clone(&session),
                last_used: Instant::now(),
            },
        );
        self.enforce_capacity(&mut slots);
        session
    }

    fn existing(&self, session_id: &str) -> Option<SessionRef> {
        let mut slots = self.slots();
        self.evict_expired(&mut slots);
        slots.get_mut(session_id).map(|slot| {
            slot.last_used = Instant::now();
            Arc::clone(&slot.session)
        })
    }

    /// Append one turn, creating the session if needed
    #[inline]
    pub fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let session = self.get_or_create(session_id);
        lock_session(&session).push(role, content);
    }

    /// Copy of the turns recorded for `session_id`; empty if unknown
    #[inline]
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.existing(session_id)
            .map(|session| lock_session(&session).turns().to_vec())
            .unwrap_or_default()
    }

    /// Render the history as `User:`/`Assistant:` lines
    #[inline]
    pub fn transcript(&self, session_id: &str) -> String {
        let history = self.history(session_id);
        if history.is_empty() {
            return "No history found for this session.".to_string();
        }

        history
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                };
                format!("{}: {}", speaker, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn evict_expired(&self, slots: &mut LruCache<String, Slot>) {
        let Some(ttl) = self.limits.idle_ttl else {
            return;
        };

        let expired: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.is_idle() && slot.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            debug!("Evicting expired session {}", key);
            slots.pop(&key);
        }
    }

    fn enforce_capacity(&self, slots: &mut LruCache<String, Slot>) {
        let Some(max_sessions) = self.limits.max_sessions else {
            return;
        };

        while slots.len() > max_sessions {
            // Least recently used first
            let victim = slots
                .iter()
                .rev()
                .find(|(_, slot)| slot.is_idle())
                .map(|(key, _)| key.clone());

            match victim {
                Some(key) => {
                    debug!("Evicting least recently used session {}", key);
                    slots.pop(&key);
                }
                None => {
                    warn!(
                        "All {} sessions are busy, exceeding limit of {}",
                        slots.len(),
                        max_sessions
                    );
                    break;
                }
            }
        }
    }
}
