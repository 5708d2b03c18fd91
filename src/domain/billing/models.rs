//! Billing domain entities and write models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::plan::Plan;

/// A subscription row as stored.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    pub cancellation_mode: Option<String>,
    pub cancellation_effective_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Fields extracted from a webhook payload to apply to a subscription.
///
/// Every field is optional; absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPatch {
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub plan: Option<Plan>,
    pub status: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionPatch {
    /// True when the payload yielded nothing worth writing.
    pub fn is_empty(&self) -> bool {
        self.subscription_id.is_none()
            && self.customer_id.is_none()
            && self.plan.is_none()
            && self.status.is_none()
            && self.current_period_end.is_none()
    }
}

/// Cancellation intent recorded alongside a canceled subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CancellationDetails {
    pub requested_at: Option<DateTime<Utc>>,
    pub mode: Option<String>,
    pub effective_at: Option<DateTime<Utc>>,
}

/// Full write model for a subscription upsert.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionChange {
    pub user_id: Option<String>,
    pub patch: SubscriptionPatch,
    pub cancellation: CancellationDetails,
}

/// Invoice data extracted from a webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceSnapshot {
    pub invoice_id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub status: String,
    pub currency: Option<String>,
    pub amount: Option<i64>,
    pub hosted_url: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub raw: Value,
}

/// Identity hints pulled from a webhook payload.
///
/// A metadata user id always outranks email candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityHints {
    pub metadata_user_id: Option<String>,
    pub email_candidates: Vec<String>,
}

/// A stored webhook event row, as loaded for replay.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub provider_event_id: Option<String>,
    pub event_type: String,
    pub payload: Value,
    pub status: String,
}

/// Plan-derived capabilities surfaced to clients.
///
/// Paid tiers carry the backing subscription's status and period end;
/// the free tier carries neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlements {
    pub plan: String,
    pub features: Vec<String>,
    pub daily_requests: u32,
    pub status: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}
