//! Webhook ingestion.
//!
//! The ingest pipeline is: verify the signature over the raw body, parse
//! and normalize, dedup (provider event id first, then payload digest),
//! store, reconcile, and mark the stored row processed or errored.
//! Nothing is written before the signature checks out.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::billing::{
    normalize, payload_digest, EventType, WebhookError, WebhookVerifier,
};
use crate::ports::{EventStore, InsertOutcome, NewEvent};

use super::reconcile::ReconcileEvent;

/// What happened to a delivery.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub event_type: EventType,
    /// Set when the delivery was recognized as already seen.
    pub dedup_by: Option<DedupKey>,
    /// Row id of the stored event, when this delivery created one.
    pub event_id: Option<i64>,
}

impl IngestOutcome {
    pub fn is_dedup(&self) -> bool {
        self.dedup_by.is_some()
    }
}

/// Which dedup check caught a repeat delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKey {
    ProviderEventId,
    Digest,
}

impl DedupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupKey::ProviderEventId => "event_id",
            DedupKey::Digest => "digest",
        }
    }
}

/// Command handler for inbound webhook deliveries.
#[derive(Clone)]
pub struct IngestWebhook {
    verifier: Arc<WebhookVerifier>,
    events: Arc<dyn EventStore>,
    reconciler: ReconcileEvent,
}

impl IngestWebhook {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        events: Arc<dyn EventStore>,
        reconciler: ReconcileEvent,
    ) -> Self {
        Self {
            verifier,
            events,
            reconciler,
        }
    }

    pub async fn execute(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<IngestOutcome, WebhookError> {
        let signature = signature.ok_or_else(|| {
            WebhookError::InvalidSignature("missing creem-signature header".into())
        })?;
        self.verifier.verify(body, signature)?;

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let normalized = normalize(&payload)?;

        if let Some(provider_event_id) = &normalized.provider_event_id {
            if self
                .events
                .find_by_provider_event_id(provider_event_id)
                .await?
                .is_some()
            {
                info!(
                    provider_event_id = %provider_event_id,
                    "Duplicate delivery by provider event id"
                );
                return Ok(IngestOutcome {
                    event_type: normalized.event_type,
                    dedup_by: Some(DedupKey::ProviderEventId),
                    event_id: None,
                });
            }
        }

        let new_event = NewEvent {
            provider_event_id: normalized.provider_event_id.clone(),
            event_type: normalized.event_type.as_str().to_string(),
            digest: payload_digest(body),
            payload,
        };
        let event_id = match self.events.insert(new_event).await? {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::DuplicateDigest => {
                info!("Duplicate delivery by payload digest");
                return Ok(IngestOutcome {
                    event_type: normalized.event_type,
                    dedup_by: Some(DedupKey::Digest),
                    event_id: None,
                });
            }
        };

        match self.reconciler.execute(&normalized).await {
            Ok(summary) => {
                self.events.mark_processed(event_id).await?;
                info!(
                    event_id,
                    event_type = %normalized.event_type,
                    routed_by = ?summary.routed_by,
                    "Webhook processed"
                );
                Ok(IngestOutcome {
                    event_type: normalized.event_type,
                    dedup_by: None,
                    event_id: Some(event_id),
                })
            }
            Err(e) => {
                // Keep the row around in error state so it can be replayed.
                if let Err(mark_err) = self.events.mark_error(event_id, &e.to_string()).await {
                    warn!(event_id, error = %mark_err, "Failed to mark event as errored");
                }
                Err(WebhookError::Reconciliation(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::{
        FailingSubscriptionRepo, InMemoryEventStore, InMemoryInvoiceRepo, InMemoryProfileRepo,
        InMemorySubscriptionRepo,
    };
    use crate::domain::billing::compute_test_signature;
    use serde_json::json;

    const SECRET: &[u8] = b"whsec_handler_test";

    struct Harness {
        events: Arc<InMemoryEventStore>,
        subscriptions: Arc<InMemorySubscriptionRepo>,
        handler: IngestWebhook,
    }

    fn harness() -> Harness {
        let events = Arc::new(InMemoryEventStore::default());
        let subscriptions = Arc::new(InMemorySubscriptionRepo::default());
        let reconciler = ReconcileEvent::new(
            subscriptions.clone(),
            Arc::new(InMemoryProfileRepo::default()),
            Arc::new(InMemoryInvoiceRepo::default()),
        );
        let handler = IngestWebhook::new(
            Arc::new(WebhookVerifier::new(SECRET)),
            events.clone(),
            reconciler,
        );
        Harness {
            events,
            subscriptions,
            handler,
        }
    }

    fn failing_harness() -> Harness {
        let events = Arc::new(InMemoryEventStore::default());
        let subscriptions = Arc::new(InMemorySubscriptionRepo::default());
        let reconciler = ReconcileEvent::new(
            Arc::new(FailingSubscriptionRepo),
            Arc::new(InMemoryProfileRepo::default()),
            Arc::new(InMemoryInvoiceRepo::default()),
        );
        let handler = IngestWebhook::new(
            Arc::new(WebhookVerifier::new(SECRET)),
            events.clone(),
            reconciler,
        );
        Harness {
            events,
            subscriptions,
            handler,
        }
    }

    fn signed(body: &[u8]) -> String {
        compute_test_signature(SECRET, body)
    }

    #[tokio::test]
    async fn valid_delivery_is_stored_and_processed() {
        let h = harness();
        let body = json!({
            "id": "evt_1",
            "type": "subscription.created",
            "data": { "subscription": { "id": "sub_1", "plan": "pro", "status": "active" } }
        })
        .to_string();

        let outcome = h
            .handler
            .execute(body.as_bytes(), Some(&signed(body.as_bytes())))
            .await
            .unwrap();

        assert!(!outcome.is_dedup());
        let event_id = outcome.event_id.unwrap();
        assert_eq!(h.events.status_of(event_id).as_deref(), Some("processed"));
        assert_eq!(h.subscriptions.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_signature_writes_nothing() {
        let h = harness();
        let body = br#"{"id":"evt_2","type":"subscription.created"}"#;

        let err = h.handler.execute(body, None).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(h.events.len(), 0);
        assert!(h.subscriptions.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_signature_writes_nothing() {
        let h = harness();
        let body = br#"{"id":"evt_3","type":"subscription.created"}"#;
        let wrong = compute_test_signature(b"other_secret", body);

        let err = h.handler.execute(body, Some(&wrong)).await.unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature(_)));
        assert_eq!(h.events.len(), 0);
    }

    #[tokio::test]
    async fn malformed_body_with_valid_signature_is_rejected() {
        let h = harness();
        let body = b"not json at all";

        let err = h
            .handler
            .execute(body, Some(&signed(body)))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::MalformedPayload(_)));
        assert_eq!(h.events.len(), 0);
    }

    #[tokio::test]
    async fn repeat_provider_event_id_dedups() {
        let h = harness();
        let first = json!({ "id": "evt_dup", "type": "payment.succeeded", "data": { "id": "inv_1" } })
            .to_string();
        let second =
            json!({ "id": "evt_dup", "type": "payment.succeeded", "data": { "id": "inv_1", "retry": true } })
                .to_string();

        h.handler
            .execute(first.as_bytes(), Some(&signed(first.as_bytes())))
            .await
            .unwrap();
        let outcome = h
            .handler
            .execute(second.as_bytes(), Some(&signed(second.as_bytes())))
            .await
            .unwrap();

        assert_eq!(outcome.dedup_by, Some(DedupKey::ProviderEventId));
        assert_eq!(h.events.len(), 1);
    }

    #[tokio::test]
    async fn identical_body_without_event_id_dedups_by_digest() {
        let h = harness();
        let body = json!({ "type": "payment.succeeded", "data": { "id": "inv_2" } }).to_string();
        let sig = signed(body.as_bytes());

        h.handler.execute(body.as_bytes(), Some(&sig)).await.unwrap();
        let outcome = h.handler.execute(body.as_bytes(), Some(&sig)).await.unwrap();

        assert_eq!(outcome.dedup_by, Some(DedupKey::Digest));
        assert_eq!(h.events.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_deliveries_process_once() {
        let h = harness();
        let body = json!({
            "id": "evt_race",
            "type": "subscription.created",
            "data": { "subscription": { "id": "sub_race", "plan": "pro" } }
        })
        .to_string();
        let sig = signed(body.as_bytes());

        let (a, b) = tokio::join!(
            h.handler.execute(body.as_bytes(), Some(&sig)),
            h.handler.execute(body.as_bytes(), Some(&sig)),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(h.events.len(), 1);
        assert!(a.is_dedup() ^ b.is_dedup());
        assert_eq!(h.subscriptions.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconciliation_failure_marks_event_errored() {
        let h = failing_harness();
        let body = json!({
            "id": "evt_fail",
            "type": "subscription.created",
            "data": { "subscription": { "id": "sub_f", "plan": "pro" } }
        })
        .to_string();

        let err = h
            .handler
            .execute(body.as_bytes(), Some(&signed(body.as_bytes())))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 500);
        // The raw event survives in error state for later replay.
        assert_eq!(h.events.len(), 1);
        assert_eq!(h.events.status_of(1).as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn unknown_event_type_still_processes() {
        let h = harness();
        let body = json!({ "id": "evt_u", "type": "refund.created", "data": {} }).to_string();

        let outcome = h
            .handler
            .execute(body.as_bytes(), Some(&signed(body.as_bytes())))
            .await
            .unwrap();

        assert!(!outcome.is_dedup());
        assert_eq!(outcome.event_type, EventType::Unknown);
        assert_eq!(
            h.events.status_of(outcome.event_id.unwrap()).as_deref(),
            Some("processed")
        );
    }
}
