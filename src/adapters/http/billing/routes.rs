//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    get_entitlements, handle_creem_webhook, replay_webhook, BillingAppState,
};

/// Create the provider webhook router.
///
/// Separate from the user-facing routes because webhook deliveries carry
/// no session; they are authenticated by signature.
///
/// # Routes
/// - `POST /creem` - Ingest a Creem webhook delivery
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/creem", post(handle_creem_webhook))
}

/// Create the debug router (requires authentication).
///
/// # Routes
/// - `GET /webhooks/replay?id=` - Rerun reconciliation for a stored event
pub fn debug_routes() -> Router<BillingAppState> {
    Router::new().route("/webhooks/replay", get(replay_webhook))
}

/// Create the billing API router (requires authentication).
///
/// # Routes
/// - `GET /entitlements` - Derive current user's entitlements
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new().route("/entitlements", get(get_entitlements))
}

/// Create the complete billing module router, suitable for mounting at
/// `/api`.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/webhooks", webhook_routes())
        .nest("/debug", debug_routes())
        .nest("/billing", billing_routes())
}
