//! Billing command and query handlers.

mod get_entitlements;
mod ingest_webhook;
mod reconcile;
mod replay_webhook;

pub use get_entitlements::GetEntitlements;
pub use ingest_webhook::{DedupKey, IngestOutcome, IngestWebhook};
pub use reconcile::{ReconcileEvent, ReconcileSummary, UpsertKey};
pub use replay_webhook::{ReplaySummary, ReplayWebhook};

#[cfg(test)]
pub mod test_support;
