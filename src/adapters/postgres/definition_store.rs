//! PostgreSQL implementation of DefinitionStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::DomainError;
use crate::ports::{DefinitionStore, ServiceRecord};

/// Service catalogue backed by the `ussd_services` table.
#[derive(Clone)]
pub struct PostgresDefinitionStore {
    pool: PgPool,
}

impl PostgresDefinitionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a service record.
    pub async fn upsert(&self, record: &ServiceRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO ussd_services (code, name, short_code, json_config, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name,
                short_code = EXCLUDED.short_code,
                json_config = EXCLUDED.json_config,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(&record.code)
        .bind(&record.name)
        .bind(&record.short_code)
        .bind(&record.json_config)
        .bind(record.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save service: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl DefinitionStore for PostgresDefinitionStore {
    async fn get_by_code(&self, code: &str) -> Result<Option<ServiceRecord>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT code, name, short_code, json_config, is_active
            FROM ussd_services WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch service: {}", e)))?;

        row.map(row_to_record).transpose()
    }

    async fn get_by_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<ServiceRecord>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT code, name, short_code, json_config, is_active
            FROM ussd_services WHERE short_code = $1 AND short_code <> ''
            ORDER BY is_active DESC
            LIMIT 1
            "#,
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to fetch service by short code: {}", e))
        })?;

        row.map(row_to_record).transpose()
    }

    async fn list_active(&self) -> Result<Vec<ServiceRecord>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT code, name, short_code, json_config, is_active
            FROM ussd_services WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list services: {}", e)))?;

        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> Result<ServiceRecord, DomainError> {
    let get = |name: &str| -> Result<String, DomainError> {
        row.try_get(name)
            .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
    };

    Ok(ServiceRecord {
        code: get("code")?,
        name: get("name")?,
        short_code: get("short_code")?,
        json_config: get("json_config")?,
        is_active: row
            .try_get("is_active")
            .map_err(|e| DomainError::database(format!("Failed to get is_active: {}", e)))?,
    })
}
