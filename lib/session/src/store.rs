//! Session storage.
//!
//! `SessionStore` is the seam to whatever backs sessions. The in-memory
//! store serves a single process; replicated backends plug in behind the
//! same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokenbridge_core::{Result, SessionId};
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::session::Session;

/// Storage backend for sessions, keyed by session ID.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a live session. Expired sessions are reported as absent.
    async fn load(&self, id: SessionId) -> Result<Option<Session>, SessionError>;

    /// Inserts or replaces a session.
    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Deletes a session. Deleting an unknown session is not an error.
    async fn delete(&self, id: SessionId) -> Result<(), SessionError>;

    /// Deletes every expired session and returns how many were removed.
    async fn delete_expired(&self) -> Result<u64, SessionError>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    max_sessions: Option<usize>,
}

impl MemorySessionStore {
    /// Creates an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses new sessions beyond `max_sessions`.
    #[must_use]
    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::default(),
            max_sessions: Some(max_sessions),
        }
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).filter(|s| !s.is_expired()).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;

        if let Some(max) = self.max_sessions
            && !sessions.contains_key(&session.id())
            && sessions.len() >= max
        {
            return Err(SessionError::WriteFailed {
                session_id: session.id().to_string(),
                reason: format!("session store is full ({max} sessions)"),
            }
            .into());
        }

        sessions.insert(session.id(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn save_then_load_returns_session() {
        let store = MemorySessionStore::new();
        let mut session = Session::new(SessionId::new(), Duration::hours(1));
        session.insert("k", "v");

        store.save(&session).await.expect("save");
        let loaded = store.load(session.id()).await.expect("load");

        assert_eq!(loaded, Some(session));
    }

    #[tokio::test]
    async fn expired_sessions_load_as_absent() {
        let store = MemorySessionStore::new();
        let session = Session::new(SessionId::new(), Duration::seconds(-1));

        store.save(&session).await.expect("save");
        assert!(store.load(session.id()).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn delete_expired_keeps_live_sessions() {
        let store = MemorySessionStore::new();
        let live = Session::new(SessionId::new(), Duration::hours(1));
        let stale = Session::new(SessionId::new(), Duration::seconds(-1));
        store.save(&live).await.expect("save live");
        store.save(&stale).await.expect("save stale");

        assert_eq!(store.delete_expired().await.expect("cleanup"), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.load(live.id()).await.expect("load").is_some());
    }

    #[tokio::test]
    async fn full_store_refuses_new_sessions_but_updates_existing() {
        let store = MemorySessionStore::with_max_sessions(1);
        let mut first = Session::new(SessionId::new(), Duration::hours(1));
        store.save(&first).await.expect("first save");

        let second = Session::new(SessionId::new(), Duration::hours(1));
        let err = store.save(&second).await.expect_err("store is full");
        assert!(matches!(
            err.current_context(),
            SessionError::WriteFailed { .. }
        ));

        first.insert("k", "v");
        store.save(&first).await.expect("update existing");
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let store = MemorySessionStore::new();
        let session = Session::new(SessionId::new(), Duration::hours(1));
        store.save(&session).await.expect("save");

        store.delete(session.id()).await.expect("delete");
        assert!(store.is_empty().await);
        store.delete(session.id()).await.expect("idempotent delete");
    }
}
