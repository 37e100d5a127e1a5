//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresSessionRepository` - carrier sessions (`ussd_sessions`)
//! - `PostgresStorageRepository` - per-subscriber records (`generic_storage`)
//! - `PostgresDefinitionStore` - service catalogue (`ussd_services`)

mod definition_store;
mod session_repository;
mod storage_repository;

pub use definition_store::PostgresDefinitionStore;
pub use session_repository::PostgresSessionRepository;
pub use storage_repository::PostgresStorageRepository;

use sqlx::PgPool;

use crate::domain::foundation::DomainError;

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))
}
