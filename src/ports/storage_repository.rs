//! Generic storage port.
//!
//! Key/value records scoped to a subscriber and a service. Records outlive
//! sessions, so a service can remember favourites, carts or history
//! between dials.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::DomainError;

/// Identifies one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub phone_number: String,
    pub service_code: String,
    pub key: String,
}

impl StorageKey {
    pub fn new(
        phone_number: impl Into<String>,
        service_code: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            phone_number: phone_number.into(),
            service_code: service_code.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// Returns `None` when nothing is stored under the key.
    async fn load(&self, key: &StorageKey) -> Result<Option<Value>, DomainError>;

    /// Insert or overwrite the value.
    async fn save(&self, key: &StorageKey, value: &Value) -> Result<(), DomainError>;

    /// Push `item` onto the list stored under the key, creating it if needed.
    async fn append(&self, key: &StorageKey, item: &Value) -> Result<(), DomainError>;

    /// Remove the record. Deleting a missing record is not an error.
    async fn delete(&self, key: &StorageKey) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn StorageRepository) {}
    }
}
