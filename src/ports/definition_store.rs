//! Definition store port.
//!
//! Registered services and their automaton JSON. Registration itself
//! happens elsewhere; the gateway only reads.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// A registered service as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub code: String,
    pub name: String,
    pub short_code: String,
    /// Automaton definition as JSON text.
    pub json_config: String,
    pub is_active: bool,
}

#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn get_by_code(&self, code: &str) -> Result<Option<ServiceRecord>, DomainError>;

    async fn get_by_short_code(&self, short_code: &str)
        -> Result<Option<ServiceRecord>, DomainError>;

    /// Active services ordered by name.
    async fn list_active(&self) -> Result<Vec<ServiceRecord>, DomainError>;
}
