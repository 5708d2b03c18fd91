//! Event store port.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::billing::StoredEvent;
use crate::domain::foundation::DomainError;

/// A webhook event about to be persisted.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub provider_event_id: Option<String>,
    pub event_type: String,
    pub digest: String,
    pub payload: Value,
}

/// Result of attempting to insert a new event.
///
/// Digest uniqueness is enforced by the store itself, so two concurrent
/// inserts of the same body resolve here rather than in application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    DuplicateDigest,
}

/// Persistence for raw webhook deliveries.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Looks up an event by the provider-assigned event id.
    async fn find_by_provider_event_id(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<StoredEvent>, DomainError>;

    /// Inserts a new event row; a digest collision is an outcome, not an
    /// error.
    async fn insert(&self, event: NewEvent) -> Result<InsertOutcome, DomainError>;

    /// Marks an event as fully reconciled.
    async fn mark_processed(&self, id: i64) -> Result<(), DomainError>;

    /// Marks an event as failed, recording the error detail.
    async fn mark_error(&self, id: i64, detail: &str) -> Result<(), DomainError>;

    /// Loads a stored event by row id, for replay.
    async fn load(&self, id: i64) -> Result<Option<StoredEvent>, DomainError>;
}
