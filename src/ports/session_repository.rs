//! Session repository port.
//!
//! Defines the contract for persisting and retrieving Session aggregates.
//! Sessions are soft-deactivated first and only removed by the purge.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::session::Session;

/// Repository port for Session aggregate persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Find a session by its carrier session id.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, DomainError>;

    /// Most recently active session for a phone number, if any is active.
    async fn find_active_by_phone(&self, phone_number: &str)
        -> Result<Option<Session>, DomainError>;

    /// Insert or replace a session.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn save(&self, session: &Session) -> Result<(), DomainError>;

    /// Mark a session inactive without removing it.
    async fn soft_delete_by_id(&self, id: &str) -> Result<(), DomainError>;

    /// Deactivate every active session whose expiry is before `threshold`.
    ///
    /// Returns the number of sessions expired.
    async fn bulk_expire_before(&self, threshold: Timestamp) -> Result<u64, DomainError>;

    /// Remove inactive sessions whose last activity is before `threshold`.
    ///
    /// Returns the number of sessions deleted.
    async fn hard_delete_before(&self, threshold: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn session_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SessionRepository) {}
    }
}
