//! HTTP DTOs for billing endpoints.
//!
//! These types define the JSON request/response structure for the billing
//! API. They serve as the boundary between HTTP and the application layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::{IngestOutcome, ReplaySummary, UpsertKey};
use crate::domain::billing::Entitlements;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query parameters for webhook replay.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayQuery {
    /// Row id of the stored webhook event.
    pub id: i64,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgment returned to the provider for a webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    /// True when the delivery was recognized as a repeat.
    pub dedup: bool,
    /// Which dedup check matched, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<&'static str>,
    /// Canonical type of the delivered event.
    pub event_type: String,
}

impl From<IngestOutcome> for WebhookAck {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            ok: true,
            dedup: outcome.is_dedup(),
            by: outcome.dedup_by.map(|k| k.as_str()),
            event_type: outcome.event_type.as_str().to_string(),
        }
    }
}

/// Response for a webhook replay run.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayResponse {
    pub ok: bool,
    pub event_id: i64,
    pub event_type: String,
    /// Which key routed the subscription write, if one happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed_by: Option<&'static str>,
    pub subscription_written: bool,
    pub profile_synced: bool,
    pub invoice_written: bool,
}

impl From<ReplaySummary> for ReplayResponse {
    fn from(summary: ReplaySummary) -> Self {
        Self {
            ok: true,
            event_id: summary.event_id,
            event_type: summary.event_type,
            routed_by: summary.reconcile.routed_by.map(|k| match k {
                UpsertKey::SubscriptionId => "subscription_id",
                UpsertKey::CustomerId => "customer_id",
                UpsertKey::UserId => "user_id",
            }),
            subscription_written: summary.reconcile.subscription_written,
            profile_synced: summary.reconcile.profile_synced,
            invoice_written: summary.reconcile.invoice_written,
        }
    }
}

/// Response for an entitlements lookup.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementsResponse {
    pub plan: String,
    pub features: Vec<String>,
    pub daily_requests: u32,
    /// Status of the backing subscription, absent on the free tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,
}

impl From<Entitlements> for EntitlementsResponse {
    fn from(ent: Entitlements) -> Self {
        Self {
            plan: ent.plan,
            features: ent.features,
            daily_requests: ent.daily_requests,
            status: ent.status,
            current_period_end: ent.current_period_end,
        }
    }
}

/// Standard error response structure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::DedupKey;
    use crate::domain::billing::EventType;

    #[test]
    fn ack_from_fresh_ingest() {
        let ack = WebhookAck::from(IngestOutcome {
            event_type: EventType::SubscriptionCreated,
            dedup_by: None,
            event_id: Some(7),
        });
        assert!(ack.ok);
        assert!(!ack.dedup);
        assert_eq!(ack.by, None);
        assert_eq!(ack.event_type, "subscription.created");
    }

    #[test]
    fn ack_from_dedup_carries_key() {
        let ack = WebhookAck::from(IngestOutcome {
            event_type: EventType::PaymentSucceeded,
            dedup_by: Some(DedupKey::Digest),
            event_id: None,
        });
        assert!(ack.dedup);
        assert_eq!(ack.by, Some("digest"));
    }

    #[test]
    fn entitlements_subscription_fields_follow_the_tier() {
        let paid = EntitlementsResponse::from(Entitlements {
            plan: "pro".to_string(),
            features: vec!["basic".to_string(), "pro".to_string()],
            daily_requests: 1000,
            status: Some("active".to_string()),
            current_period_end: Some(Utc::now()),
        });
        let json = serde_json::to_string(&paid).unwrap();
        assert!(json.contains("\"status\""));
        assert!(json.contains("\"current_period_end\""));

        let free = EntitlementsResponse::from(Entitlements {
            plan: "free".to_string(),
            features: vec!["basic".to_string()],
            daily_requests: 50,
            status: None,
            current_period_end: None,
        });
        let json = serde_json::to_string(&free).unwrap();
        assert!(!json.contains("\"status\""));
        assert!(!json.contains("\"current_period_end\""));
    }

    #[test]
    fn dedup_key_omitted_from_json_when_absent() {
        let ack = WebhookAck {
            ok: true,
            dedup: false,
            by: None,
            event_type: "unknown".to_string(),
        };
        let json = serde_json::to_string(&ack).unwrap();
        assert!(!json.contains("\"by\""));
    }
}
