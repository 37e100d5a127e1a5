//! PostgreSQL implementation of SessionRepository.
//!
//! Session data is stored as JSON text in `ussd_sessions.session_data`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::session::Session;
use crate::ports::SessionRepository;

const SELECT_COLUMNS: &str = r#"
    SELECT id, phone_number, service_code, current_state_id, session_data,
           is_active, created_at, last_activity, expires_at
    FROM ussd_sessions
"#;

/// PostgreSQL implementation of SessionRepository.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch session: {}", e)))?;

        row.map(row_to_session).transpose()
    }

    async fn find_active_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Session>, DomainError> {
        let row = sqlx::query(&format!(
            "{} WHERE phone_number = $1 AND is_active ORDER BY last_activity DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to fetch session by phone: {}", e))
        })?;

        row.map(row_to_session).transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), DomainError> {
        let data = serde_json::to_string(session.data())?;

        sqlx::query(
            r#"
            INSERT INTO ussd_sessions (
                id, phone_number, service_code, current_state_id, session_data,
                is_active, created_at, last_activity, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                phone_number = EXCLUDED.phone_number,
                service_code = EXCLUDED.service_code,
                current_state_id = EXCLUDED.current_state_id,
                session_data = EXCLUDED.session_data,
                is_active = EXCLUDED.is_active,
                created_at = EXCLUDED.created_at,
                last_activity = EXCLUDED.last_activity,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.id())
        .bind(session.phone_number())
        .bind(session.service_code())
        .bind(session.current_state_id())
        .bind(data)
        .bind(session.is_active())
        .bind(session.created_at().as_datetime())
        .bind(session.last_activity().as_datetime())
        .bind(session.expires_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save session: {}", e)))?;

        Ok(())
    }

    async fn soft_delete_by_id(&self, id: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE ussd_sessions SET is_active = FALSE, last_activity = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to end session: {}", e)))?;

        Ok(())
    }

    async fn bulk_expire_before(&self, threshold: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE ussd_sessions SET is_active = FALSE
            WHERE is_active AND expires_at < $1
            "#,
        )
        .bind(threshold.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to expire sessions: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn hard_delete_before(&self, threshold: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM ussd_sessions
            WHERE NOT is_active AND last_activity < $1
            "#,
        )
        .bind(threshold.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to purge sessions: {}", e)))?;

        Ok(result.rows_affected())
    }
}

fn column<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
}

fn row_to_session(row: sqlx::postgres::PgRow) -> Result<Session, DomainError> {
    let raw_data: String = column(&row, "session_data")?;

    Ok(Session::reconstitute(
        column(&row, "id")?,
        column(&row, "phone_number")?,
        column(&row, "service_code")?,
        column(&row, "current_state_id")?,
        parse_data(&raw_data)?,
        column(&row, "is_active")?,
        Timestamp::from_datetime(column(&row, "created_at")?),
        Timestamp::from_datetime(column(&row, "last_activity")?),
        Timestamp::from_datetime(column(&row, "expires_at")?),
    ))
}

/// Session data column to a JSON object; blank text is an empty object.
fn parse_data(raw: &str) -> Result<Map<String, Value>, DomainError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::new(
            ErrorCode::SerializationError,
            format!("Session data is not an object: {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_data_accepts_objects_and_blank() {
        assert!(parse_data("").unwrap().is_empty());
        assert_eq!(
            parse_data(r#"{"amount": 150}"#).unwrap().get("amount"),
            Some(&serde_json::json!(150))
        );
    }

    #[test]
    fn parse_data_rejects_non_objects() {
        let err = parse_data("[1, 2]").unwrap_err();
        assert_eq!(err.code, ErrorCode::SerializationError);
        assert!(parse_data("{broken").is_err());
    }
}
