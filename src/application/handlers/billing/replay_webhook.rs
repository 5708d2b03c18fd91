//! Webhook replay.
//!
//! Replays a stored event through the same reconciliation path as live
//! ingestion. Signature and dedup checks are skipped: the payload was
//! already verified and stored once, and replay exists precisely to rerun
//! it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::billing::{normalize, WebhookError};
use crate::ports::EventStore;

use super::reconcile::{ReconcileEvent, ReconcileSummary};

/// What a replay run did.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub event_id: i64,
    pub event_type: String,
    pub reconcile: ReconcileSummary,
}

/// Command handler replaying one stored event by row id.
#[derive(Clone)]
pub struct ReplayWebhook {
    events: Arc<dyn EventStore>,
    reconciler: ReconcileEvent,
}

impl ReplayWebhook {
    pub fn new(events: Arc<dyn EventStore>, reconciler: ReconcileEvent) -> Self {
        Self { events, reconciler }
    }

    pub async fn execute(&self, event_id: i64) -> Result<ReplaySummary, WebhookError> {
        let stored = self
            .events
            .load(event_id)
            .await?
            .ok_or_else(|| WebhookError::EventNotFound(event_id.to_string()))?;

        let normalized = normalize(&stored.payload)?;

        match self.reconciler.execute(&normalized).await {
            Ok(summary) => {
                self.events.mark_processed(event_id).await?;
                info!(
                    event_id,
                    event_type = %normalized.event_type,
                    "Webhook replayed"
                );
                Ok(ReplaySummary {
                    event_id,
                    event_type: normalized.event_type.as_str().to_string(),
                    reconcile: summary,
                })
            }
            Err(e) => {
                if let Err(mark_err) = self.events.mark_error(event_id, &e.to_string()).await {
                    warn!(event_id, error = %mark_err, "Failed to mark replayed event as errored");
                }
                Err(WebhookError::Reconciliation(e.to_string()))
            }
        }
    }
}
