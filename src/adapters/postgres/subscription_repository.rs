//! PostgreSQL implementation of the SubscriptionRepository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Subscription, SubscriptionChange};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::SubscriptionRepository;

/// PostgreSQL-backed subscription repository.
///
/// Change application uses COALESCE so absent fields in a change leave
/// the stored column untouched.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Option<Uuid>,
    subscription_id: Option<String>,
    customer_id: Option<String>,
    plan: Option<String>,
    status: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    cancellation_requested_at: Option<DateTime<Utc>>,
    cancellation_mode: Option<String>,
    cancellation_effective_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            id: row.id,
            user_id: row.user_id.map(|u| u.to_string()),
            subscription_id: row.subscription_id,
            customer_id: row.customer_id,
            plan: row.plan,
            status: row.status,
            current_period_end: row.current_period_end,
            cancellation_requested_at: row.cancellation_requested_at,
            cancellation_mode: row.cancellation_mode,
            cancellation_effective_at: row.cancellation_effective_at,
            updated_at: row.updated_at,
        }
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

/// Bind-ready view of a change: user id parsed, plan stringified.
struct ChangeBinds {
    user_id: Option<Uuid>,
    subscription_id: Option<String>,
    customer_id: Option<String>,
    plan: Option<String>,
    status: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    cancellation_requested_at: Option<DateTime<Utc>>,
    cancellation_mode: Option<String>,
    cancellation_effective_at: Option<DateTime<Utc>>,
}

impl ChangeBinds {
    fn try_from_change(change: &SubscriptionChange) -> Result<Self, DomainError> {
        let user_id = change
            .user_id
            .as_deref()
            .map(parse_user_id_as_uuid)
            .transpose()?;
        Ok(Self {
            user_id,
            subscription_id: change.patch.subscription_id.clone(),
            customer_id: change.patch.customer_id.clone(),
            plan: change.patch.plan.map(|p| p.as_str().to_string()),
            status: change.patch.status.clone(),
            current_period_end: change.patch.current_period_end,
            cancellation_requested_at: change.cancellation.requested_at,
            cancellation_mode: change.cancellation.mode.clone(),
            cancellation_effective_at: change.cancellation.effective_at,
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert_by_subscription_id(
        &self,
        change: &SubscriptionChange,
    ) -> Result<Uuid, DomainError> {
        let binds = ChangeBinds::try_from_change(change)?;
        if binds.subscription_id.is_none() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Upsert by subscription id requires a subscription id",
            ));
        }

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (
                user_id, subscription_id, customer_id, plan, status, current_period_end,
                cancellation_requested_at, cancellation_mode, cancellation_effective_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            ON CONFLICT (subscription_id) DO UPDATE SET
                user_id = COALESCE(EXCLUDED.user_id, subscriptions.user_id),
                customer_id = COALESCE(EXCLUDED.customer_id, subscriptions.customer_id),
                plan = COALESCE(EXCLUDED.plan, subscriptions.plan),
                status = COALESCE(EXCLUDED.status, subscriptions.status),
                current_period_end = COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end),
                cancellation_requested_at = COALESCE(EXCLUDED.cancellation_requested_at, subscriptions.cancellation_requested_at),
                cancellation_mode = COALESCE(EXCLUDED.cancellation_mode, subscriptions.cancellation_mode),
                cancellation_effective_at = COALESCE(EXCLUDED.cancellation_effective_at, subscriptions.cancellation_effective_at),
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(binds.user_id)
        .bind(&binds.subscription_id)
        .bind(&binds.customer_id)
        .bind(&binds.plan)
        .bind(&binds.status)
        .bind(binds.current_period_end)
        .bind(binds.cancellation_requested_at)
        .bind(&binds.cancellation_mode)
        .bind(binds.cancellation_effective_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to upsert subscription: {}", e),
            )
        })?;

        Ok(id)
    }

    async fn find_id_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM subscriptions WHERE subscription_id = $1",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription by provider id: {}", e),
            )
        })?;

        Ok(row.map(|(id,)| id))
    }

    async fn find_id_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM subscriptions
            WHERE customer_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription by customer id: {}", e),
            )
        })?;

        Ok(row.map(|(id,)| id))
    }

    async fn find_latest_id_by_user_id(&self, user_id: &str) -> Result<Option<Uuid>, DomainError> {
        let user_uuid = parse_user_id_as_uuid(user_id)?;

        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM subscriptions
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription by user id: {}", e),
            )
        })?;

        Ok(row.map(|(id,)| id))
    }

    async fn update_by_id(&self, id: Uuid, change: &SubscriptionChange) -> Result<(), DomainError> {
        let binds = ChangeBinds::try_from_change(change)?;

        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                user_id = COALESCE($2, user_id),
                subscription_id = COALESCE($3, subscription_id),
                customer_id = COALESCE($4, customer_id),
                plan = COALESCE($5, plan),
                status = COALESCE($6, status),
                current_period_end = COALESCE($7, current_period_end),
                cancellation_requested_at = COALESCE($8, cancellation_requested_at),
                cancellation_mode = COALESCE($9, cancellation_mode),
                cancellation_effective_at = COALESCE($10, cancellation_effective_at),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(binds.user_id)
        .bind(&binds.subscription_id)
        .bind(&binds.customer_id)
        .bind(&binds.plan)
        .bind(&binds.status)
        .bind(binds.current_period_end)
        .bind(binds.cancellation_requested_at)
        .bind(&binds.cancellation_mode)
        .bind(binds.cancellation_effective_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update subscription: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("No subscription with id {}", id),
            ));
        }
        Ok(())
    }

    async fn insert(&self, change: &SubscriptionChange) -> Result<Uuid, DomainError> {
        let binds = ChangeBinds::try_from_change(change)?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (
                user_id, subscription_id, customer_id, plan, status, current_period_end,
                cancellation_requested_at, cancellation_mode, cancellation_effective_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            RETURNING id
            "#,
        )
        .bind(binds.user_id)
        .bind(&binds.subscription_id)
        .bind(&binds.customer_id)
        .bind(&binds.plan)
        .bind(&binds.status)
        .bind(binds.current_period_end)
        .bind(binds.cancellation_requested_at)
        .bind(&binds.cancellation_mode)
        .bind(binds.cancellation_effective_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert subscription: {}", e),
            )
        })?;

        Ok(id)
    }

    async fn find_latest_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let user_uuid = parse_user_id_as_uuid(user_id)?;

        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, subscription_id, customer_id, plan, status,
                   current_period_end, cancellation_requested_at, cancellation_mode,
                   cancellation_effective_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load subscription for user: {}", e),
            )
        })?;

        Ok(row.map(Subscription::from))
    }
}
