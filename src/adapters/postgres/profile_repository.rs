//! PostgreSQL implementation of the ProfileRepository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::ProfileRepository;

/// PostgreSQL-backed profile repository.
pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_user_id_as_uuid(user_id: &str) -> Result<Uuid, DomainError> {
    Uuid::parse_str(user_id).map_err(|e| {
        DomainError::new(
            ErrorCode::ValidationFailed,
            format!("User ID must be a valid UUID: {}", e),
        )
    })
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<String>, DomainError> {
        // lower() comparison rather than ILIKE: the candidate may contain
        // characters ILIKE treats as wildcards, and lower(email) is indexed.
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM profiles WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to look up profile by email: {}", e),
            )
        })?;

        Ok(row.map(|(id,)| id.to_string()))
    }

    async fn set_plan(
        &self,
        user_id: &str,
        plan: &str,
        plan_expires: Option<DateTime<Utc>>,
    ) -> Result<bool, DomainError> {
        let user_uuid = parse_user_id_as_uuid(user_id)?;

        // Zero rows means the profile does not exist yet; the caller
        // decides whether that is worth a warning.
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET plan = $2, plan_expires = $3
            WHERE user_id = $1
            "#,
        )
        .bind(user_uuid)
        .bind(plan)
        .bind(plan_expires)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to set profile plan: {}", e),
            )
        })?;

        Ok(result.rows_affected() > 0)
    }
}
