//! Entitlement derivation.
//!
//! Entitlements are never stored; they are computed from the latest
//! subscription row at read time, so a lapsed period or a cancellation
//! takes effect without any background job.

use chrono::{DateTime, Utc};

use super::models::{Entitlements, Subscription};
use super::plan::Plan;

/// Derives the effective entitlements for a user.
///
/// The user is on the free tier when they have no subscription row, the
/// subscription is canceled or expired, or its period end has passed.
pub fn derive_entitlements(
    subscription: Option<&Subscription>,
    now: DateTime<Utc>,
) -> Entitlements {
    let plan = effective_plan(subscription, now);
    let mut entitlements = for_plan(plan);
    if plan != Plan::Free {
        if let Some(sub) = subscription {
            entitlements.status = sub.status.clone();
            entitlements.current_period_end = sub.current_period_end;
        }
    }
    entitlements
}

fn effective_plan(subscription: Option<&Subscription>, now: DateTime<Utc>) -> Plan {
    let Some(sub) = subscription else {
        return Plan::Free;
    };

    if let Some(status) = sub.status.as_deref() {
        if matches!(status, "canceled" | "cancelled" | "expired") {
            return Plan::Free;
        }
    }

    if let Some(period_end) = sub.current_period_end {
        if period_end < now {
            return Plan::Free;
        }
    }

    sub.plan
        .as_deref()
        .and_then(Plan::parse)
        .unwrap_or(Plan::Free)
}

fn for_plan(plan: Plan) -> Entitlements {
    match plan {
        Plan::Free => Entitlements {
            plan: "free".to_string(),
            features: vec!["basic".to_string()],
            daily_requests: 50,
            status: None,
            current_period_end: None,
        },
        Plan::Pro => Entitlements {
            plan: "pro".to_string(),
            features: vec!["basic".to_string(), "pro".to_string()],
            daily_requests: 1000,
            status: None,
            current_period_end: None,
        },
        Plan::Team => Entitlements {
            plan: "team".to_string(),
            features: vec!["basic".to_string(), "pro".to_string(), "team".to_string()],
            daily_requests: 5000,
            status: None,
            current_period_end: None,
        },
    }
}
