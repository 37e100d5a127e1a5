//! PostgreSQL implementation of StorageRepository.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::domain::foundation::DomainError;
use crate::ports::{StorageKey, StorageRepository};

/// PostgreSQL implementation of StorageRepository.
///
/// Values are stored as JSON text; appends are done in SQL so concurrent
/// appends to the same key never lose an item.
#[derive(Clone)]
pub struct PostgresStorageRepository {
    pool: PgPool,
}

impl PostgresStorageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageRepository for PostgresStorageRepository {
    async fn load(&self, key: &StorageKey) -> Result<Option<Value>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT value FROM generic_storage
            WHERE phone_number = $1 AND service_code = $2 AND storage_key = $3
            "#,
        )
        .bind(&key.phone_number)
        .bind(&key.service_code)
        .bind(&key.key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load storage record: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row
            .try_get("value")
            .map_err(|e| DomainError::database(format!("Failed to get value: {}", e)))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, key: &StorageKey, value: &Value) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO generic_storage (phone_number, service_code, storage_key, value, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (phone_number, service_code, storage_key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(&key.phone_number)
        .bind(&key.service_code)
        .bind(&key.key)
        .bind(serde_json::to_string(value)?)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save storage record: {}", e)))?;

        Ok(())
    }

    async fn append(&self, key: &StorageKey, item: &Value) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO generic_storage (phone_number, service_code, storage_key, value, updated_at)
            VALUES ($1, $2, $3, jsonb_build_array($4::jsonb)::text, NOW())
            ON CONFLICT (phone_number, service_code, storage_key) DO UPDATE SET
                value = (
                    CASE WHEN jsonb_typeof(generic_storage.value::jsonb) = 'array'
                        THEN generic_storage.value::jsonb || jsonb_build_array($4::jsonb)
                        ELSE jsonb_build_array(generic_storage.value::jsonb, $4::jsonb)
                    END
                )::text,
                updated_at = NOW()
            "#,
        )
        .bind(&key.phone_number)
        .bind(&key.service_code)
        .bind(&key.key)
        .bind(serde_json::to_string(item)?)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to append storage record: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            DELETE FROM generic_storage
            WHERE phone_number = $1 AND service_code = $2 AND storage_key = $3
            "#,
        )
        .bind(&key.phone_number)
        .bind(&key.service_code)
        .bind(&key.key)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to delete storage record: {}", e)))?;

        Ok(())
    }
}
