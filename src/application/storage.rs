//! GenericStorageService - per-subscriber records that outlive a session.
//!
//! Records are scoped by phone number, service code and key, so two
//! services never see each other's data.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::foundation::DomainError;
use crate::ports::{StorageKey, StorageRepository};

pub struct GenericStorageService {
    repository: Arc<dyn StorageRepository>,
}

impl GenericStorageService {
    pub fn new(repository: Arc<dyn StorageRepository>) -> Self {
        Self { repository }
    }

    pub async fn load(
        &self,
        phone_number: &str,
        service_code: &str,
        key: &str,
    ) -> Result<Option<Value>, DomainError> {
        let value = self
            .repository
            .load(&StorageKey::new(phone_number, service_code, key))
            .await?;
        debug!(service_code = %service_code, key = %key, found = value.is_some(), "storage load");
        Ok(value)
    }

    pub async fn save(
        &self,
        phone_number: &str,
        service_code: &str,
        key: &str,
        value: &Value,
    ) -> Result<(), DomainError> {
        debug!(service_code = %service_code, key = %key, "storage save");
        self.repository
            .save(&StorageKey::new(phone_number, service_code, key), value)
            .await
    }

    /// Adds `item` to the list stored under `key`, creating it when absent.
    pub async fn append(
        &self,
        phone_number: &str,
        service_code: &str,
        key: &str,
        item: &Value,
    ) -> Result<(), DomainError> {
        debug!(service_code = %service_code, key = %key, "storage append");
        self.repository
            .append(&StorageKey::new(phone_number, service_code, key), item)
            .await
    }

    pub async fn delete(
        &self,
        phone_number: &str,
        service_code: &str,
        key: &str,
    ) -> Result<(), DomainError> {
        debug!(service_code = %service_code, key = %key, "storage delete");
        self.repository
            .delete(&StorageKey::new(phone_number, service_code, key))
            .await
    }
}
