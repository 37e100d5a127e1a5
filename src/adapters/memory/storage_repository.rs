//! In-Memory Generic Storage Repository

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{StorageKey, StorageRepository};

/// In-memory storage for per-subscriber records
#[derive(Debug, Clone)]
pub struct InMemoryStorageRepository {
    records: Arc<RwLock<HashMap<StorageKey, Value>>>,
}

impl InMemoryStorageRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clear all records (useful for tests)
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    /// Number of stored records
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryStorageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageRepository for InMemoryStorageRepository {
    async fn load(&self, key: &StorageKey) -> Result<Option<Value>, DomainError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save(&self, key: &StorageKey, value: &Value) -> Result<(), DomainError> {
        self.records.write().await.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn append(&self, key: &StorageKey, item: &Value) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let entry = records
            .entry(key.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(item.clone()),
            other => {
                let previous = other.take();
                *other = Value::Array(vec![previous, item.clone()]);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), DomainError> {
        self.records.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(name: &str) -> StorageKey {
        StorageKey::new("612345678", "BANK", name)
    }

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let repo = InMemoryStorageRepository::new();
        repo.save(&key("profile"), &json!({"name": "Awa"})).await.unwrap();
        repo.save(&key("profile"), &json!({"name": "Moussa"})).await.unwrap();

        assert_eq!(
            repo.load(&key("profile")).await.unwrap(),
            Some(json!({"name": "Moussa"}))
        );
        assert_eq!(repo.record_count().await, 1);
    }

    #[tokio::test]
    async fn append_creates_then_extends_list() {
        let repo = InMemoryStorageRepository::new();
        repo.append(&key("history"), &json!("a")).await.unwrap();
        repo.append(&key("history"), &json!("b")).await.unwrap();

        assert_eq!(repo.load(&key("history")).await.unwrap(), Some(json!(["a", "b"])));
    }

    #[tokio::test]
    async fn append_to_scalar_wraps_it() {
        let repo = InMemoryStorageRepository::new();
        repo.save(&key("history"), &json!("first")).await.unwrap();
        repo.append(&key("history"), &json!("second")).await.unwrap();

        assert_eq!(
            repo.load(&key("history")).await.unwrap(),
            Some(json!(["first", "second"]))
        );
    }

    #[tokio::test]
    async fn records_are_scoped_by_phone_and_service() {
        let repo = InMemoryStorageRepository::new();
        repo.save(&key("profile"), &json!(1)).await.unwrap();

        let other_phone = StorageKey::new("699999999", "BANK", "profile");
        let other_service = StorageKey::new("612345678", "SHOP", "profile");
        assert!(repo.load(&other_phone).await.unwrap().is_none());
        assert!(repo.load(&other_service).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let repo = InMemoryStorageRepository::new();
        repo.save(&key("profile"), &json!(1)).await.unwrap();
        repo.delete(&key("profile")).await.unwrap();
        repo.delete(&key("never-saved")).await.unwrap();

        assert!(repo.load(&key("profile")).await.unwrap().is_none());
    }
}
