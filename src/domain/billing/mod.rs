//! Billing domain: event types, payload normalization, signature
//! verification, and entitlement derivation.

mod entitlements;
mod event_type;
mod models;
mod normalizer;
mod plan;
mod signature;
mod webhook_errors;

pub use entitlements::derive_entitlements;
pub use event_type::EventType;
pub use models::{
    CancellationDetails, Entitlements, IdentityHints, InvoiceSnapshot, StoredEvent, Subscription,
    SubscriptionChange, SubscriptionPatch,
};
pub use normalizer::{
    extract_customer_id, extract_event_type, extract_identity, extract_invoice,
    extract_subscription_id, extract_subscription_patch, normalize, parse_flexible_timestamp,
    NormalizedEvent,
};
pub use plan::Plan;
pub use signature::{payload_digest, WebhookVerifier};
pub use webhook_errors::WebhookError;

#[cfg(test)]
pub use signature::compute_test_signature;
