//! ServiceRegistry - resolves services and caches their parsed definitions.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::automaton::AutomatonDefinition;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{DefinitionStore, ServiceRecord};

/// Catalogue of services backed by a [`DefinitionStore`].
///
/// Definitions are parsed once per service code and shared behind an
/// `Arc` until [`invalidate`](Self::invalidate) drops them.
pub struct ServiceRegistry {
    store: Arc<dyn DefinitionStore>,
    cache: DashMap<String, Arc<AutomatonDefinition>>,
    max_message_length: usize,
}

impl ServiceRegistry {
    pub fn new(store: Arc<dyn DefinitionStore>, max_message_length: usize) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            max_message_length,
        }
    }

    /// Parsed definition of an active service.
    ///
    /// # Errors
    ///
    /// - `ServiceNotFound` when no record carries `code`
    /// - `InactiveService` when the record is disabled
    /// - `InvalidDefinition` when the stored JSON does not parse
    pub async fn load_automaton(
        &self,
        code: &str,
    ) -> Result<Arc<AutomatonDefinition>, DomainError> {
        if let Some(cached) = self.cache.get(code) {
            return Ok(Arc::clone(cached.value()));
        }

        let record = self.store.get_by_code(code).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::ServiceNotFound, format!("Service not found: {}", code))
        })?;
        if !record.is_active {
            return Err(DomainError::new(
                ErrorCode::InactiveService,
                format!("Service is disabled: {}", code),
            ));
        }

        let definition = Arc::new(self.parse(&record)?);
        self.cache
            .insert(record.code.clone(), Arc::clone(&definition));
        debug!(service_code = %code, states = definition.states.len(), "definition cached");
        Ok(definition)
    }

    /// Active service reachable by a dialled short code.
    pub async fn service_by_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<ServiceRecord>, DomainError> {
        Ok(self
            .store
            .get_by_short_code(short_code)
            .await?
            .filter(|r| r.is_active))
    }

    pub async fn active_services(&self) -> Result<Vec<ServiceRecord>, DomainError> {
        self.store.list_active().await
    }

    /// Drops the cached definition of one service.
    pub fn invalidate(&self, code: &str) {
        self.cache.remove(code);
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn parse(&self, record: &ServiceRecord) -> Result<AutomatonDefinition, DomainError> {
        let definition = AutomatonDefinition::from_json(&record.json_config).map_err(|e| {
            DomainError::new(
                ErrorCode::InvalidDefinition,
                format!("Invalid definition for {}: {}", record.code, e),
            )
        })?;

        for issue in definition.validate(self.max_message_length) {
            warn!(service_code = %record.code, issue = %issue, "definition issue");
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDefinitionStore;
    use crate::domain::automaton::DEFAULT_MAX_MESSAGE_LENGTH;

    const HELLO: &str = r#"{
        "serviceCode": "HELLO",
        "states": [{"id": "START", "type": "FINAL", "isInitial": true, "message": "Bonjour"}]
    }"#;

    fn record(code: &str, json: &str, active: bool) -> ServiceRecord {
        ServiceRecord {
            code: code.to_string(),
            name: code.to_string(),
            short_code: format!("*{}#", code.len()),
            json_config: json.to_string(),
            is_active: active,
        }
    }

    async fn registry_with(records: Vec<ServiceRecord>) -> ServiceRegistry {
        let store = InMemoryDefinitionStore::new();
        for r in records {
            store.insert(r).await;
        }
        ServiceRegistry::new(Arc::new(store), DEFAULT_MAX_MESSAGE_LENGTH)
    }

    #[tokio::test]
    async fn load_automaton_parses_and_caches() {
        let registry = registry_with(vec![record("HELLO", HELLO, true)]).await;

        let first = registry.load_automaton("HELLO").await.unwrap();
        let second = registry.load_automaton("HELLO").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached_count(), 1);

        registry.invalidate("HELLO");
        assert_eq!(registry.cached_count(), 0);
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let registry = registry_with(vec![]).await;
        let err = registry.load_automaton("NOPE").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ServiceNotFound);
    }

    #[tokio::test]
    async fn disabled_service_is_rejected() {
        let registry = registry_with(vec![record("HELLO", HELLO, false)]).await;
        let err = registry.load_automaton("HELLO").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InactiveService);
        assert!(registry.service_by_short_code("*5#").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_definition() {
        let registry = registry_with(vec![record("BAD", "{not json", true)]).await;
        let err = registry.load_automaton("BAD").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDefinition);
        assert_eq!(registry.cached_count(), 0);
    }
}
