//! In-Memory Session Repository
//!
//! Stores sessions keyed by carrier session id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::session::Session;
use crate::ports::SessionRepository;

/// In-memory storage for sessions
#[derive(Debug, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clear all stored sessions (useful for tests)
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }

    /// Number of stored sessions, active or not
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of active sessions
    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_active())
            .count()
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, DomainError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn find_active_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Session>, DomainError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.is_active() && s.phone_number() == phone_number)
            .max_by_key(|s| *s.last_activity().as_datetime())
            .cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), DomainError> {
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), session.clone());
        Ok(())
    }

    async fn soft_delete_by_id(&self, id: &str) -> Result<(), DomainError> {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.deactivate();
        }
        Ok(())
    }

    async fn bulk_expire_before(&self, threshold: Timestamp) -> Result<u64, DomainError> {
        let mut sessions = self.sessions.write().await;
        let mut expired = 0;
        for session in sessions.values_mut() {
            if session.is_active() && session.expires_at().is_before(&threshold) {
                session.deactivate();
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn hard_delete_before(&self, threshold: Timestamp) -> Result<u64, DomainError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_active() || !s.last_activity().is_before(&threshold));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_find_by_id() {
        let repo = InMemorySessionRepository::new();
        let session = Session::new("s-1", "612345678", "BANK", "MAIN", 300);
        repo.save(&session).await.unwrap();

        let found = repo.find_by_id("s-1").await.unwrap();
        assert_eq!(found, Some(session));
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_active_by_phone_ignores_inactive() {
        let repo = InMemorySessionRepository::new();
        repo.save(&Session::new("s-1", "612345678", "BANK", "MAIN", 300))
            .await
            .unwrap();
        repo.soft_delete_by_id("s-1").await.unwrap();

        assert!(repo.find_active_by_phone("612345678").await.unwrap().is_none());
        assert_eq!(repo.session_count().await, 1);
        assert_eq!(repo.active_count().await, 0);
    }

    #[tokio::test]
    async fn bulk_expire_then_purge() {
        let repo = InMemorySessionRepository::new();
        repo.save(&Session::new("s-1", "612345678", "BANK", "MAIN", 30))
            .await
            .unwrap();

        let future = Timestamp::now().plus_secs(60);
        assert_eq!(repo.bulk_expire_before(future).await.unwrap(), 1);
        assert_eq!(repo.active_count().await, 0);

        assert_eq!(repo.hard_delete_before(future).await.unwrap(), 1);
        assert_eq!(repo.session_count().await, 0);
    }

    #[tokio::test]
    async fn purge_keeps_active_sessions() {
        let repo = InMemorySessionRepository::new();
        repo.save(&Session::new("s-1", "612345678", "BANK", "MAIN", 300))
            .await
            .unwrap();

        let future = Timestamp::now().plus_secs(60);
        assert_eq!(repo.hard_delete_before(future).await.unwrap(), 0);
        assert_eq!(repo.session_count().await, 1);
    }
}
