//! PostgreSQL implementation of the InvoiceRepository port.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::InvoiceSnapshot;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::InvoiceRepository;

/// PostgreSQL-backed invoice repository.
///
/// Later events for an invoice overwrite its status and raw payload;
/// optional columns only move forward (COALESCE keeps known values when a
/// later event omits them).
pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn upsert(&self, snapshot: &InvoiceSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, customer_id, subscription_id, status, currency, amount,
                hosted_url, issued_at, paid_at, period_start, period_end, raw
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (invoice_id) DO UPDATE SET
                customer_id = COALESCE(EXCLUDED.customer_id, invoices.customer_id),
                subscription_id = COALESCE(EXCLUDED.subscription_id, invoices.subscription_id),
                status = EXCLUDED.status,
                currency = COALESCE(EXCLUDED.currency, invoices.currency),
                amount = COALESCE(EXCLUDED.amount, invoices.amount),
                hosted_url = COALESCE(EXCLUDED.hosted_url, invoices.hosted_url),
                issued_at = COALESCE(EXCLUDED.issued_at, invoices.issued_at),
                paid_at = COALESCE(EXCLUDED.paid_at, invoices.paid_at),
                period_start = COALESCE(EXCLUDED.period_start, invoices.period_start),
                period_end = COALESCE(EXCLUDED.period_end, invoices.period_end),
                raw = EXCLUDED.raw
            "#,
        )
        .bind(&snapshot.invoice_id)
        .bind(&snapshot.customer_id)
        .bind(&snapshot.subscription_id)
        .bind(&snapshot.status)
        .bind(&snapshot.currency)
        .bind(snapshot.amount)
        .bind(&snapshot.hosted_url)
        .bind(snapshot.issued_at)
        .bind(snapshot.paid_at)
        .bind(snapshot.period_start)
        .bind(snapshot.period_end)
        .bind(&snapshot.raw)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to upsert invoice: {}", e),
            )
        })?;

        Ok(())
    }
}
