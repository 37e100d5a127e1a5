//! Filesystem definition store.
//!
//! Loads every `*.json`, `*.yaml` and `*.yml` automaton definition from a
//! directory: {definitions_dir}/{anything}.json. Files that do not parse
//! are skipped with a warning so one broken service never hides the rest.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::adapters::memory::InMemoryDefinitionStore;
use crate::domain::automaton::AutomatonDefinition;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{DefinitionStore, ServiceRecord};

/// Definition store backed by a directory of definition files.
pub struct FileDefinitionStore {
    dir: PathBuf,
    services: InMemoryDefinitionStore,
}

impl FileDefinitionStore {
    /// Open a directory and load its definitions.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let store = Self {
            dir: dir.as_ref().to_path_buf(),
            services: InMemoryDefinitionStore::new(),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Re-read the directory; returns the number of services loaded.
    pub async fn reload(&self) -> Result<usize, DomainError> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            DomainError::new(
                ErrorCode::StorageError,
                format!("Failed to read {}: {}", self.dir.display(), e),
            )
        })?;

        let mut loaded = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            DomainError::new(ErrorCode::StorageError, format!("Failed to list definitions: {}", e))
        })? {
            let path = entry.path();
            let Some(format) = DefinitionFormat::of(&path) else {
                continue;
            };

            match read_definition(&path, format).await {
                Ok(definition) => {
                    self.services.register(&definition).await?;
                    loaded += 1;
                }
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "skipping definition file");
                }
            }
        }

        info!(dir = %self.dir.display(), services = loaded, "definitions loaded");
        Ok(loaded)
    }
}

#[derive(Debug, Clone, Copy)]
enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(DefinitionFormat::Json),
            "yaml" | "yml" => Some(DefinitionFormat::Yaml),
            _ => None,
        }
    }
}

async fn read_definition(
    path: &Path,
    format: DefinitionFormat,
) -> Result<AutomatonDefinition, String> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| format!("read failed: {}", e))?;

    match format {
        DefinitionFormat::Json => AutomatonDefinition::from_json(&content).map_err(|e| e.to_string()),
        DefinitionFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
    }
}

#[async_trait]
impl DefinitionStore for FileDefinitionStore {
    async fn get_by_code(&self, code: &str) -> Result<Option<ServiceRecord>, DomainError> {
        self.services.get_by_code(code).await
    }

    async fn get_by_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<ServiceRecord>, DomainError> {
        self.services.get_by_short_code(short_code).await
    }

    async fn list_active(&self) -> Result<Vec<ServiceRecord>, DomainError> {
        self.services.list_active().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JSON_DEF: &str = r#"{
        "serviceCode": "BANK",
        "serviceName": "Banque",
        "shortCode": "*123#",
        "states": [{"id": "S", "type": "FINAL", "isInitial": true, "message": "Bonjour"}]
    }"#;

    const YAML_DEF: &str = r#"
serviceCode: SHOP
serviceName: Boutique
shortCode: "*456#"
states:
  - id: S
    type: FINAL
    isInitial: true
    message: Bienvenue
"#;

    #[tokio::test]
    async fn loads_json_and_yaml_definitions() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("bank.json"), JSON_DEF).unwrap();
        std::fs::write(temp_dir.path().join("shop.yml"), YAML_DEF).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let store = FileDefinitionStore::open(temp_dir.path()).await.unwrap();

        let names: Vec<String> = store
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Banque", "Boutique"]);
        assert_eq!(
            store.get_by_short_code("*456#").await.unwrap().map(|r| r.code),
            Some("SHOP".to_string())
        );
    }

    #[tokio::test]
    async fn broken_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("bank.json"), JSON_DEF).unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();

        let store = FileDefinitionStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reload_picks_up_new_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDefinitionStore::open(temp_dir.path()).await.unwrap();
        assert!(store.get_by_code("BANK").await.unwrap().is_none());

        std::fs::write(temp_dir.path().join("bank.json"), JSON_DEF).unwrap();
        assert_eq!(store.reload().await.unwrap(), 1);
        assert!(store.get_by_code("BANK").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileDefinitionStore::open(temp_dir.path().join("absent")).await;
        assert!(result.is_err());
    }
}
