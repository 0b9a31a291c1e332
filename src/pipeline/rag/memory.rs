use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::models::ConversationTurn;

/// Ordered, append-only turn log for one session.
#[derive(Debug)]
pub struct SessionMemory {
    turns: Vec<ConversationTurn>,
    last_active: DateTime<Utc>,
}

impl SessionMemory {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            last_active: Utc::now(),
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    fn append(&mut self, input: &str, output: &str) {
        let sequence_index = self.turns.len();
        self.turns
            .push(ConversationTurn::new(input, output, sequence_index));
        self.last_active = Utc::now();
    }
}

/// Session-keyed conversation memory.
///
/// One `SessionMemory` per session id, created on first use and evicted
/// after `ttl` of inactivity or an explicit reset. Each session sits
/// behind its own mutex, so interleaved requests for different sessions
/// never touch each other's history and two writers on the same key
/// serialize instead of corrupting it.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionMemory>>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn session(&self, session_id: &str) -> Arc<Mutex<SessionMemory>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionMemory::new())))
            .clone()
    }

    /// All prior turns for the session, in original order. Empty on the
    /// first turn.
    pub fn load(&self, session_id: &str) -> Vec<ConversationTurn> {
        let session = self.session(session_id);
        let memory = session.lock().unwrap_or_else(|e| e.into_inner());
        memory.turns().to_vec()
    }

    /// Append a completed turn. Unconditional — apology/error replies are
    /// recorded too, so conversational continuity survives pipeline
    /// failures.
    pub fn save(&self, session_id: &str, input: &str, output: &str) {
        let session = self.session(session_id);
        let mut memory = session.lock().unwrap_or_else(|e| e.into_inner());
        memory.append(input, output);
    }

    /// Drop one session's history.
    pub fn reset(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }

    /// Drop sessions idle beyond the TTL. Returns how many were evicted.
    pub fn evict_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, session| match session.lock() {
            Ok(memory) => memory.last_active > cutoff,
            Err(_) => false,
        });
        before - sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_load_is_empty() {
        let store = SessionStore::new(60);
        assert!(store.load("s1").is_empty());
    }

    #[test]
    fn save_then_load_round_trip() {
        let store = SessionStore::new(60);
        store.save("s1", "first question", "first answer");
        store.save("s1", "second question", "second answer");

        let turns = store.load("s1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].input, "first question");
        assert_eq!(turns[0].sequence_index, 0);
        assert_eq!(turns[1].output, "second answer");
        assert_eq!(turns[1].sequence_index, 1);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new(60);
        store.save("alice", "a question", "a answer");
        store.save("bob", "b question", "b answer");

        let alice = store.load("alice");
        let bob = store.load("bob");
        assert_eq!(alice.len(), 1);
        assert_eq!(bob.len(), 1);
        assert_eq!(alice[0].input, "a question");
        assert_eq!(bob[0].input, "b question");
    }

    #[test]
    fn reset_clears_only_that_session() {
        let store = SessionStore::new(60);
        store.save("alice", "q", "a");
        store.save("bob", "q", "a");

        store.reset("alice");
        assert!(store.load("alice").is_empty());
        assert_eq!(store.load("bob").len(), 1);
    }

    #[test]
    fn eviction_removes_idle_sessions() {
        // TTL of zero minutes: everything already idle is evictable.
        let store = SessionStore::new(0);
        store.save("old", "q", "a");

        std::thread::sleep(std::time::Duration::from_millis(5));
        let evicted = store.evict_expired();
        assert_eq!(evicted, 1);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn concurrent_saves_to_different_sessions_do_not_interleave() {
        let store = Arc::new(SessionStore::new(60));
        let mut handles = Vec::new();

        for session in ["s1", "s2"] {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    store.save(session, &format!("{session} q{i}"), &format!("{session} a{i}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for session in ["s1", "s2"] {
            let turns = store.load(session);
            assert_eq!(turns.len(), 50);
            for (i, turn) in turns.iter().enumerate() {
                assert_eq!(turn.sequence_index, i);
                assert!(turn.input.starts_with(session));
            }
        }
    }
}
