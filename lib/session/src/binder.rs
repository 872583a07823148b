//! Binding exchanged tokens to sessions.
//!
//! The binder is the only component that writes token slots. It runs after
//! a token is fully decoded and persists with a single `save`, so a session
//! never holds half of a token.

use std::sync::Arc;

use chrono::Duration;
use tokenbridge_core::{Result, SessionId};
use tokenbridge_oauth::{TokenResult, redact};
use tracing::instrument;

use crate::error::SessionError;
use crate::session::{ACCESS_TOKEN_KEY, INSTANCE_URL_KEY, Session};
use crate::store::SessionStore;

/// Writes access tokens into sessions and reads them back.
#[derive(Clone)]
pub struct SessionBinder {
    store: Arc<dyn SessionStore>,
    duration: Duration,
}

impl SessionBinder {
    /// Creates a binder whose sessions live for `duration` after each bind.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, duration: Duration) -> Self {
        Self { store, duration }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Binds `token` to the session named by `existing`, or to a new session.
    ///
    /// A missing, unknown, or expired session ID starts a fresh session. A
    /// stale `instanceURL` from an earlier token is cleared when the new
    /// token carries none.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WriteFailed` if the session cannot be loaded or saved.
    #[instrument(skip(self, token))]
    pub async fn bind_token(
        &self,
        existing: Option<SessionId>,
        token: &TokenResult,
    ) -> Result<Session, SessionError> {
        let loaded = match existing {
            Some(id) => self.store.load(id).await.map_err(|report| {
                report.context(SessionError::WriteFailed {
                    session_id: id.to_string(),
                    reason: "could not load the session to update".to_string(),
                })
            })?,
            None => None,
        };

        let mut session = loaded.unwrap_or_else(|| Session::new(SessionId::new(), self.duration));

        session.insert(ACCESS_TOKEN_KEY, token.access_token());
        match token.instance_url() {
            Some(instance_url) => session.insert(INSTANCE_URL_KEY, instance_url),
            None => {
                session.remove(INSTANCE_URL_KEY);
            }
        }
        session.extend(self.duration);

        self.store.save(&session).await?;

        tracing::info!(
            session_id = %session.id(),
            access_token = %redact(token.access_token()),
            "bound access token to session"
        );

        Ok(session)
    }

    /// Reads back the access token bound to a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ReadFailed` if the store cannot be read.
    pub async fn access_token(&self, id: SessionId) -> Result<Option<String>, SessionError> {
        Ok(self
            .store
            .load(id)
            .await?
            .and_then(|session| session.access_token().map(str::to_string)))
    }

    /// Rebuilds the bound token for downstream calls.
    ///
    /// Only the access token and instance URL survive binding, so the
    /// result carries nothing else.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ReadFailed` if the store cannot be read.
    pub async fn bound_token(&self, id: SessionId) -> Result<Option<TokenResult>, SessionError> {
        let Some(session) = self.store.load(id).await? else {
            return Ok(None);
        };
        let Some(access_token) = session.access_token() else {
            return Ok(None);
        };

        let token = TokenResult::bearer(access_token);
        Ok(Some(match session.instance_url() {
            Some(instance_url) => token.with_instance_url(instance_url),
            None => token,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use async_trait::async_trait;

    fn binder() -> (SessionBinder, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (
            SessionBinder::new(store.clone(), Duration::minutes(30)),
            store,
        )
    }

    fn salesforce_token(access_token: &str) -> TokenResult {
        TokenResult::bearer(access_token).with_instance_url("https://na1.example.com")
    }

    #[tokio::test]
    async fn bound_token_reads_back_from_same_session() {
        let (binder, _) = binder();

        let session = binder
            .bind_token(None, &salesforce_token("AT1"))
            .await
            .expect("bind");

        assert_eq!(
            binder.access_token(session.id()).await.expect("read"),
            Some("AT1".to_string())
        );
        let token = binder
            .bound_token(session.id())
            .await
            .expect("read")
            .expect("bound");
        assert_eq!(token.access_token(), "AT1");
        assert_eq!(token.instance_url(), Some("https://na1.example.com"));
    }

    #[tokio::test]
    async fn rebinding_reuses_existing_session() {
        let (binder, store) = binder();

        let first = binder
            .bind_token(None, &salesforce_token("AT1"))
            .await
            .expect("bind");
        let second = binder
            .bind_token(Some(first.id()), &TokenResult::bearer("AT2"))
            .await
            .expect("rebind");

        assert_eq!(first.id(), second.id());
        assert_eq!(store.len().await, 1);
        assert_eq!(second.access_token(), Some("AT2"));
        assert!(second.instance_url().is_none(), "stale instance URL cleared");
    }

    #[tokio::test]
    async fn unknown_session_id_starts_fresh_session() {
        let (binder, _) = binder();
        let unknown = SessionId::new();

        let session = binder
            .bind_token(Some(unknown), &TokenResult::bearer("AT1"))
            .await
            .expect("bind");

        assert_ne!(session.id(), unknown);
    }

    #[tokio::test]
    async fn unbound_session_has_no_token() {
        let (binder, _) = binder();
        assert!(binder.bound_token(SessionId::new()).await.expect("read").is_none());
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn load(&self, id: SessionId) -> Result<Option<Session>, SessionError> {
            Err(SessionError::ReadFailed {
                session_id: id.to_string(),
                reason: "backend offline".to_string(),
            }
            .into())
        }

        async fn save(&self, session: &Session) -> Result<(), SessionError> {
            Err(SessionError::WriteFailed {
                session_id: session.id().to_string(),
                reason: "backend offline".to_string(),
            }
            .into())
        }

        async fn delete(&self, _id: SessionId) -> Result<(), SessionError> {
            Ok(())
        }

        async fn delete_expired(&self) -> Result<u64, SessionError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_write_failed() {
        let binder = SessionBinder::new(Arc::new(BrokenStore), Duration::minutes(30));

        let fresh = binder
            .bind_token(None, &TokenResult::bearer("AT1"))
            .await
            .expect_err("save fails");
        assert!(matches!(
            fresh.current_context(),
            SessionError::WriteFailed { .. }
        ));

        let existing = binder
            .bind_token(Some(SessionId::new()), &TokenResult::bearer("AT1"))
            .await
            .expect_err("load fails");
        assert!(matches!(
            existing.current_context(),
            SessionError::WriteFailed { .. }
        ));
    }
}
