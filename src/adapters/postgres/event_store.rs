//! PostgreSQL implementation of the EventStore port.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::billing::StoredEvent;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{EventStore, InsertOutcome, NewEvent};

/// PostgreSQL-backed event store.
///
/// The `digest` column carries a unique constraint; concurrent inserts of
/// the same body are resolved by the database, not by application locks.
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    id: i64,
    provider_event_id: Option<String>,
    event_type: String,
    payload: Value,
    status: String,
}

impl From<WebhookEventRow> for StoredEvent {
    fn from(row: WebhookEventRow) -> Self {
        StoredEvent {
            id: row.id,
            provider_event_id: row.provider_event_id,
            event_type: row.event_type,
            payload: row.payload,
            status: row.status,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn find_by_provider_event_id(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<StoredEvent>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT id, provider_event_id, event_type, payload, status
            FROM webhook_events
            WHERE provider_event_id = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(provider_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to look up event by provider id: {}", e),
            )
        })?;

        Ok(row.map(StoredEvent::from))
    }

    async fn insert(&self, event: NewEvent) -> Result<InsertOutcome, DomainError> {
        let result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (provider_event_id, event_type, digest, payload, status)
            VALUES ($1, $2, $3, $4, 'received')
            RETURNING id
            "#,
        )
        .bind(&event.provider_event_id)
        .bind(&event.event_type)
        .bind(&event.digest)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((id,)) => Ok(InsertOutcome::Inserted(id)),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::DuplicateDigest),
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert webhook event: {}", e),
            )),
        }
    }

    async fn mark_processed(&self, id: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processed', error_detail = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to mark event processed: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::EventNotFound,
                format!("No webhook event with id {}", id),
            ));
        }
        Ok(())
    }

    async fn mark_error(&self, id: i64, detail: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'error', error_detail = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(detail)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to mark event errored: {}", e),
            )
        })?;

        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Option<StoredEvent>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT id, provider_event_id, event_type, payload, status
            FROM webhook_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load event: {}", e),
            )
        })?;

        Ok(row.map(StoredEvent::from))
    }
}
