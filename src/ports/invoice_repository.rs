//! Invoice repository port.

use async_trait::async_trait;

use crate::domain::billing::InvoiceSnapshot;
use crate::domain::foundation::DomainError;

/// Persistence for billing history.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Upserts an invoice keyed on the provider invoice id. Later events
    /// for the same invoice overwrite earlier state.
    async fn upsert(&self, snapshot: &InvoiceSnapshot) -> Result<(), DomainError>;
}
