//! Webhook processing errors.

use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors raised while ingesting or replaying a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, or not matching the payload.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Body is not a JSON object.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// Stored event row not found (replay only).
    #[error("Webhook event not found: {0}")]
    EventNotFound(String),

    /// Persistence failure.
    #[error("Database error during webhook processing: {0}")]
    Database(#[from] DomainError),

    /// Reconciliation failed after the event was stored.
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),
}

impl WebhookError {
    /// HTTP status to answer the provider with.
    ///
    /// Signature and payload failures are the caller's fault and must not
    /// be retried as-is. Storage and reconciliation failures are ours; the
    /// provider should redeliver.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::InvalidSignature(_) => 400,
            WebhookError::MalformedPayload(_) => 400,
            WebhookError::EventNotFound(_) => 404,
            WebhookError::Database(_) => 500,
            WebhookError::Reconciliation(_) => 500,
        }
    }

    /// Whether the provider should retry the delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_) | WebhookError::Reconciliation(_)
        )
    }
}
