//! Canonical webhook event types.

use std::fmt;

/// Canonical event types emitted by the payment provider.
///
/// Provider payloads spell the type in several places and with minor
/// variations; [`EventType::parse`] folds those into this closed set.
/// Anything unrecognized maps to [`EventType::Unknown`], which is still
/// accepted and recorded but triggers no reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CheckoutCompleted,
    OrderCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionCanceled,
    InvoiceCreated,
    PaymentSucceeded,
    PaymentFailed,
    Unknown,
}

impl EventType {
    /// Parses a raw provider type string into a canonical event type.
    ///
    /// Matching is case-insensitive and accepts the British spelling of
    /// "cancelled".
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "checkout.completed" => EventType::CheckoutCompleted,
            "order.completed" => EventType::OrderCompleted,
            "subscription.created" => EventType::SubscriptionCreated,
            "subscription.updated" => EventType::SubscriptionUpdated,
            "subscription.canceled" | "subscription.cancelled" => EventType::SubscriptionCanceled,
            "invoice.created" => EventType::InvoiceCreated,
            "payment.succeeded" => EventType::PaymentSucceeded,
            "payment.failed" => EventType::PaymentFailed,
            _ => EventType::Unknown,
        }
    }

    /// Canonical string form, as stored in the event log.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CheckoutCompleted => "checkout.completed",
            EventType::OrderCompleted => "order.completed",
            EventType::SubscriptionCreated => "subscription.created",
            EventType::SubscriptionUpdated => "subscription.updated",
            EventType::SubscriptionCanceled => "subscription.canceled",
            EventType::InvoiceCreated => "invoice.created",
            EventType::PaymentSucceeded => "payment.succeeded",
            EventType::PaymentFailed => "payment.failed",
            EventType::Unknown => "unknown",
        }
    }

    /// Events that carry or imply subscription state.
    pub fn affects_subscription(&self) -> bool {
        matches!(
            self,
            EventType::CheckoutCompleted
                | EventType::OrderCompleted
                | EventType::SubscriptionCreated
                | EventType::SubscriptionUpdated
                | EventType::SubscriptionCanceled
        )
    }

    /// Events that carry invoice or payment data.
    pub fn affects_invoice(&self) -> bool {
        matches!(
            self,
            EventType::InvoiceCreated | EventType::PaymentSucceeded | EventType::PaymentFailed
        )
    }

    /// Subscription lifecycle events. For these the provider may put the
    /// subscription entity directly at `data`/`object` instead of nesting
    /// it under a `subscription` key.
    pub fn is_subscription_lifecycle(&self) -> bool {
        matches!(
            self,
            EventType::SubscriptionCreated
                | EventType::SubscriptionUpdated
                | EventType::SubscriptionCanceled
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
