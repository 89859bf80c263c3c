//! Session history store contract.
//!
//! A history store is an append-only, per-session ordered log of turns. The
//! SQLite implementation lives in `mentor-storage`; [`InMemoryHistoryStore`]
//! backs unit tests and local experiments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{MentorError, Result};
use crate::types::{ChatMessage, Turn};

/// Durable, ordered log of chat turns keyed by session identifier.
///
/// Ordering within one session is guaranteed for sequential callers only.
/// Concurrent writers to the same session may interleave; the last write
/// lands last in storage order.
pub trait SessionHistoryStore: Send + Sync {
    /// Return every turn of the session in creation order.
    ///
    /// A session without turns (or an unknown session) yields an empty vec.
    fn read_history(&self, session_id: Uuid) -> Result<Vec<Turn>>;

    /// Append one immutable turn.
    fn append_turn(&self, session_id: Uuid, message: &ChatMessage) -> Result<()>;

    /// Append several turns as one operation, in slice order.
    ///
    /// Implementations backed by a transactional store override this so the
    /// whole batch lands or none of it does.
    fn append_turns(&self, session_id: Uuid, messages: &[ChatMessage]) -> Result<()> {
        for message in messages {
            self.append_turn(session_id, message)?;
        }
        Ok(())
    }
}

/// Process-local history store.
///
/// Can be switched into an unavailable state to exercise outage handling.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    sessions: Mutex<HashMap<Uuid, Vec<Turn>>>,
    next_id: Mutex<i64>,
    unavailable: AtomicBool,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of turns across all sessions.
    pub fn total_turns(&self) -> usize {
        self.sessions
            .lock()
            .map(|s| s.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MentorError::Storage(
                "history store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl SessionHistoryStore for InMemoryHistoryStore {
    fn read_history(&self, session_id: Uuid) -> Result<Vec<Turn>> {
        self.check_available()?;
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| MentorError::Storage(format!("history lock poisoned: {}", e)))?;
        Ok(sessions.get(&session_id).cloned().unwrap_or_default())
    }

    fn append_turn(&self, session_id: Uuid, message: &ChatMessage) -> Result<()> {
        self.append_turns(session_id, std::slice::from_ref(message))
    }

    fn append_turns(&self, session_id: Uuid, messages: &[ChatMessage]) -> Result<()> {
        self.check_available()?;
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| MentorError::Storage(format!("history lock poisoned: {}", e)))?;
        let mut next_id = self
            .next_id
            .lock()
            .map_err(|e| MentorError::Storage(format!("history lock poisoned: {}", e)))?;

        let entry = sessions.entry(session_id).or_default();
        for message in messages {
            *next_id += 1;
            entry.push(Turn {
                id: *next_id,
                session_id,
                message: message.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_new_session_has_empty_history() {
        let store = InMemoryHistoryStore::new();
        assert!(store.read_history(Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn test_append_then_read_preserves_order() {
        let store = InMemoryHistoryStore::new();
        let sid = Uuid::new_v4();
        let messages: Vec<ChatMessage> = (0..5)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::human(format!("question {}", i))
                } else {
                    ChatMessage::ai(format!("answer {}", i))
                }
            })
            .collect();

        for m in &messages {
            store.append_turn(sid, m).unwrap();
        }

        let history = store.read_history(sid).unwrap();
        assert_eq!(history.len(), 5);
        for (turn, expected) in history.iter().zip(&messages) {
            assert_eq!(&turn.message, expected);
            assert_eq!(turn.session_id, sid);
        }
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = InMemoryHistoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append_turn(a, &ChatMessage::human("for a")).unwrap();
        store
            .append_turns(b, &[ChatMessage::human("for b"), ChatMessage::ai("reply b")])
            .unwrap();

        assert_eq!(store.read_history(a).unwrap().len(), 1);
        let b_history = store.read_history(b).unwrap();
        assert_eq!(b_history.len(), 2);
        assert_eq!(b_history[0].message.role, Role::Human);
        assert_eq!(b_history[1].message.role, Role::Ai);
        assert_eq!(store.total_turns(), 3);
    }

    #[test]
    fn test_unavailable_store_fails_reads_and_writes() {
        let store = InMemoryHistoryStore::new();
        store.set_unavailable(true);
        let sid = Uuid::new_v4();
        assert!(store.read_history(sid).is_err());
        assert!(store.append_turn(sid, &ChatMessage::human("x")).is_err());

        store.set_unavailable(false);
        assert!(store.read_history(sid).unwrap().is_empty());
    }
}
