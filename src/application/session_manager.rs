//! SessionManager - lifecycle and data of subscriber sessions.
//!
//! Every write re-reads the stored session, applies the change and saves
//! it back, so the engine never works from a stale copy between actions.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::session::Session;
use crate::ports::SessionRepository;

/// Session lifecycle service.
pub struct SessionManager {
    repository: Arc<dyn SessionRepository>,
    default_timeout_secs: u64,
}

impl SessionManager {
    pub fn new(repository: Arc<dyn SessionRepository>, default_timeout: Duration) -> Self {
        Self {
            repository,
            default_timeout_secs: default_timeout.as_secs(),
        }
    }

    pub fn default_timeout_secs(&self) -> u64 {
        self.default_timeout_secs
    }

    /// Returns the live session for `id`, or starts a fresh one.
    ///
    /// A stored session that is inactive or past its expiry is replaced by a
    /// new session at `initial_state_id` with empty data. A live session is
    /// touched and returned as is.
    pub async fn get_or_create(
        &self,
        id: &str,
        phone_number: &str,
        service_code: &str,
        initial_state_id: &str,
        timeout_override: Option<u64>,
    ) -> Result<Session, DomainError> {
        let timeout = timeout_override.unwrap_or(self.default_timeout_secs);

        let session = match self.repository.find_by_id(id).await? {
            Some(mut existing) if existing.is_live(&Timestamp::now()) => {
                existing.touch(timeout);
                existing
            }
            previous => {
                if previous.is_some() {
                    debug!(session_id = %id, "replacing stale session");
                }
                info!(
                    session_id = %id,
                    service_code = %service_code,
                    initial_state = %initial_state_id,
                    "session created"
                );
                Session::new(id, phone_number, service_code, initial_state_id, timeout)
            }
        };

        self.repository.save(&session).await?;
        Ok(session)
    }

    /// Active, unexpired session for `id`.
    pub async fn find_live(&self, id: &str) -> Result<Option<Session>, DomainError> {
        let now = Timestamp::now();
        Ok(self
            .repository
            .find_by_id(id)
            .await?
            .filter(|s| s.is_live(&now)))
    }

    /// Most recent active session of a subscriber.
    pub async fn find_active_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Session>, DomainError> {
        let now = Timestamp::now();
        Ok(self
            .repository
            .find_active_by_phone(phone_number)
            .await?
            .filter(|s| s.is_live(&now)))
    }

    /// Records activity and pushes the expiry forward.
    pub async fn touch(
        &self,
        id: &str,
        timeout_override: Option<u64>,
    ) -> Result<Session, DomainError> {
        let timeout = timeout_override.unwrap_or(self.default_timeout_secs);
        self.modify(id, |session| session.touch(timeout)).await
    }

    pub async fn store_session_data(
        &self,
        id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), DomainError> {
        debug!(session_id = %id, key = %key, "storing session data");
        self.modify(id, |session| session.merge_data([(key.to_string(), value)]))
            .await?;
        Ok(())
    }

    /// Merges several entries in one write.
    pub async fn store_batch_data(
        &self,
        id: &str,
        entries: Map<String, Value>,
    ) -> Result<(), DomainError> {
        if entries.is_empty() {
            return Ok(());
        }
        debug!(session_id = %id, count = entries.len(), "storing session data batch");
        self.modify(id, |session| session.merge_data(entries)).await?;
        Ok(())
    }

    pub async fn update_current_state(
        &self,
        id: &str,
        state_id: &str,
    ) -> Result<Session, DomainError> {
        self.modify(id, |session| session.move_to(state_id)).await
    }

    /// Session data as seen by templates, phone number included.
    pub async fn session_data(&self, id: &str) -> Result<Value, DomainError> {
        Ok(self.require(id).await?.template_data())
    }

    /// Deactivates the session; unknown ids are ignored.
    pub async fn end_session(&self, id: &str) -> Result<(), DomainError> {
        info!(session_id = %id, "session ended");
        self.repository.soft_delete_by_id(id).await
    }

    /// Deactivates sessions past their own expiry, which carries the
    /// per-service timeout they were created or touched with.
    pub async fn expire_inactive(&self) -> Result<u64, DomainError> {
        self.repository.bulk_expire_before(Timestamp::now()).await
    }

    /// Deletes inactive sessions older than `retention_days`.
    pub async fn purge_expired(&self, retention_days: i64) -> Result<u64, DomainError> {
        let threshold = Timestamp::now().minus_days(retention_days);
        self.repository.hard_delete_before(threshold).await
    }

    async fn require(&self, id: &str) -> Result<Session, DomainError> {
        self.repository.find_by_id(id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::SessionNotFound, format!("Session not found: {}", id))
        })
    }

    async fn modify<F>(&self, id: &str, change: F) -> Result<Session, DomainError>
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self.require(id).await?;
        change(&mut session);
        self.repository.save(&session).await?;
        Ok(session)
    }
}
