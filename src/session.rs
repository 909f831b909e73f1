//! Per-conversation history.

use crate::error::{KursError, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// One question/answer pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Default number of sessions kept before the least recently used is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Debug, Default)]
struct Session {
    exchanges: Vec<Exchange>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    clock: u64,
}

impl SessionTable {
    /// Session for `id`, created if missing, marked as most recently used.
    fn touch(&mut self, id: &str, max_sessions: usize) -> &mut Session {
        self.clock += 1;
        if !self.sessions.contains_key(id) {
            self.evict_to(max_sessions.saturating_sub(1));
        }
        let session = self.sessions.entry(id.to_string()).or_default();
        session.last_used = self.clock;
        session
    }

    fn evict_to(&mut self, limit: usize) {
        while self.sessions.len() > limit {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, session)| session.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!("Evicting session {}", id);
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }
    }
}

/// Keeps the most recent exchanges of each conversation, for a bounded
/// number of conversations.
pub struct SessionManager {
    max_history: usize,
    max_sessions: usize,
    table: RwLock<SessionTable>,
}

impl SessionManager {
    /// `max_history` is the number of exchanges retained per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            max_sessions: DEFAULT_MAX_SESSIONS,
            table: RwLock::new(SessionTable::default()),
        }
    }

    /// Cap the number of live sessions. At least one is always kept.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Start a new, empty session and return its id.
    pub fn create_session(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.write()?.touch(&id, self.max_sessions);
        debug!("Created session {}", id);
        Ok(id)
    }

    /// Record an exchange, dropping the oldest beyond the retention limit.
    /// Unknown session ids start a new session under that id.
    pub fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        let mut table = self.write()?;
        let exchanges = &mut table.touch(session_id, self.max_sessions).exchanges;
        exchanges.push(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });

        let excess = exchanges.len().saturating_sub(self.max_history);
        exchanges.drain(..excess);
        Ok(())
    }

    /// Rendered history for prompting, or `None` when there is none.
    pub fn history(&self, session_id: &str) -> Result<Option<String>> {
        let table = self
            .table
            .read()
            .map_err(|e| KursError::Session(format!("Failed to acquire lock: {}", e)))?;

        Ok(table
            .sessions
            .get(session_id)
            .filter(|session| !session.exchanges.is_empty())
            .map(|session| {
                session
                    .exchanges
                    .iter()
                    .map(|ex| format!("User: {}\nAssistant: {}", ex.user, ex.assistant))
                    .collect::<Vec<_>>()
                    .join("\n")
            }))
    }

    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        self.write()?.sessions.remove(session_id);
        Ok(())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> Result<usize> {
        let table = self
            .table
            .read()
            .map_err(|e| KursError::Session(format!("Failed to acquire lock: {}", e)))?;
        Ok(table.sessions.len())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, SessionTable>> {
        self.table
            .write()
            .map_err(|e| KursError::Session(format!("Failed to acquire lock: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let sessions = SessionManager::new(2);
        let id = sessions.create_session().unwrap();
        assert_eq!(sessions.history(&id).unwrap(), None);

        sessions.add_exchange(&id, "q1", "a1").unwrap();
        sessions.add_exchange(&id, "q2", "a2").unwrap();
        sessions.add_exchange(&id, "q3", "a3").unwrap();

        assert_eq!(
            sessions.history(&id).unwrap().as_deref(),
            Some("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3")
        );
    }

    #[test]
    fn test_sessions_are_isolated() {
        let sessions = SessionManager::new(2);
        let a = sessions.create_session().unwrap();
        let b = sessions.create_session().unwrap();
        assert_ne!(a, b);

        sessions.add_exchange(&a, "question", "answer").unwrap();
        assert!(sessions.history(&b).unwrap().is_none());

        sessions.clear_session(&a).unwrap();
        assert!(sessions.history(&a).unwrap().is_none());
    }

    #[test]
    fn test_zero_history_keeps_nothing() {
        let sessions = SessionManager::new(0);
        sessions.add_exchange("s", "q", "a").unwrap();
        assert!(sessions.history("s").unwrap().is_none());
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let sessions = SessionManager::new(2).with_max_sessions(2);
        let a = sessions.create_session().unwrap();
        let b = sessions.create_session().unwrap();

        // Using `a` again makes `b` the oldest.
        sessions.add_exchange(&a, "q", "a").unwrap();
        let c = sessions.create_session().unwrap();

        assert_eq!(sessions.session_count().unwrap(), 2);
        assert!(sessions.history(&a).unwrap().is_some());
        sessions.add_exchange(&c, "q", "a").unwrap();
        assert!(sessions.history(&c).unwrap().is_some());

        // `b` was dropped; writing to it starts over and evicts `a`.
        sessions.add_exchange(&b, "late", "reply").unwrap();
        assert_eq!(sessions.session_count().unwrap(), 2);
        assert!(sessions.history(&a).unwrap().is_none());
        assert_eq!(
            sessions.history(&b).unwrap().as_deref(),
            Some("User: late\nAssistant: reply")
        );
    }
}
