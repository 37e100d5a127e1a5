//! In-Memory Definition Store
//!
//! Holds service records registered programmatically or loaded from a
//! definitions directory at startup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::automaton::AutomatonDefinition;
use crate::domain::foundation::DomainError;
use crate::ports::{DefinitionStore, ServiceRecord};

/// In-memory catalogue of services
#[derive(Debug, Clone)]
pub struct InMemoryDefinitionStore {
    services: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register or replace a service record
    pub async fn insert(&self, record: ServiceRecord) {
        self.services
            .write()
            .await
            .insert(record.code.clone(), record);
    }

    /// Register an active service from a parsed definition
    ///
    /// Name and short code come from the definition; an empty short code
    /// leaves the service reachable only from the main menu.
    pub async fn register(&self, definition: &AutomatonDefinition) -> Result<(), DomainError> {
        let json_config = serde_json::to_string(definition)?;
        self.insert(ServiceRecord {
            code: definition.service_code.clone(),
            name: if definition.service_name.is_empty() {
                definition.service_code.clone()
            } else {
                definition.service_name.clone()
            },
            short_code: definition.short_code.clone(),
            json_config,
            is_active: true,
        })
        .await;
        Ok(())
    }

    /// Number of registered services
    pub async fn service_count(&self) -> usize {
        self.services.read().await.len()
    }
}

impl Default for InMemoryDefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn get_by_code(&self, code: &str) -> Result<Option<ServiceRecord>, DomainError> {
        Ok(self.services.read().await.get(code).cloned())
    }

    async fn get_by_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<ServiceRecord>, DomainError> {
        Ok(self
            .services
            .read()
            .await
            .values()
            .find(|r| !r.short_code.is_empty() && r.short_code == short_code)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<ServiceRecord>, DomainError> {
        let mut active: Vec<ServiceRecord> = self
            .services
            .read()
            .await
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }
}
