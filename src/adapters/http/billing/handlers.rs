//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command/query
//! handlers.

use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::billing::{
    GetEntitlements, IngestWebhook, ReconcileEvent, ReplayWebhook,
};
use crate::domain::billing::{WebhookError, WebhookVerifier};
use crate::ports::{EventStore, InvoiceRepository, ProfileRepository, SubscriptionRepository};

use super::dto::{EntitlementsResponse, ErrorResponse, ReplayQuery, ReplayResponse, WebhookAck};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped for cheap sharing.
#[derive(Clone)]
pub struct BillingAppState {
    pub event_store: Arc<dyn EventStore>,
    pub subscription_repository: Arc<dyn SubscriptionRepository>,
    pub profile_repository: Arc<dyn ProfileRepository>,
    pub invoice_repository: Arc<dyn InvoiceRepository>,
    pub webhook_verifier: Arc<WebhookVerifier>,
}

impl BillingAppState {
    fn reconciler(&self) -> ReconcileEvent {
        ReconcileEvent::new(
            self.subscription_repository.clone(),
            self.profile_repository.clone(),
            self.invoice_repository.clone(),
        )
    }

    pub fn ingest_handler(&self) -> IngestWebhook {
        IngestWebhook::new(
            self.webhook_verifier.clone(),
            self.event_store.clone(),
            self.reconciler(),
        )
    }

    pub fn replay_handler(&self) -> ReplayWebhook {
        ReplayWebhook::new(self.event_store.clone(), self.reconciler())
    }

    pub fn entitlements_handler(&self) -> GetEntitlements {
        GetEntitlements::new(self.subscription_repository.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// In production, this would be extracted from JWT/session by auth
/// middleware. For now, uses a header-based extraction for
/// development/testing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/creem - Ingest a provider webhook delivery.
///
/// No session auth; the delivery is authenticated by its signature over
/// the raw body.
pub async fn handle_creem_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers.get("creem-signature").and_then(|v| v.to_str().ok());

    let handler = state.ingest_handler();
    let outcome = handler.execute(&body, signature).await?;

    Ok((StatusCode::OK, Json(WebhookAck::from(outcome))))
}

/// GET /api/debug/webhooks/replay?id= - Rerun reconciliation for a stored
/// event.
pub async fn replay_webhook(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ReplayQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.replay_handler();
    let summary = handler.execute(query.id).await?;

    Ok(Json(ReplayResponse::from(summary)))
}

/// GET /api/billing/entitlements - Derive current user's entitlements.
pub async fn get_entitlements(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.entitlements_handler();
    let entitlements = handler.execute(&user.user_id).await?;

    Ok(Json(EntitlementsResponse::from(entitlements)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
pub struct BillingApiError(WebhookError);

impl From<WebhookError> for BillingApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::DomainError> for BillingApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self(WebhookError::Database(err))
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let error_code = match &self.0 {
            WebhookError::InvalidSignature(_) => "INVALID_SIGNATURE",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::EventNotFound(_) => "EVENT_NOT_FOUND",
            WebhookError::Database(_) => "DATABASE_ERROR",
            WebhookError::Reconciliation(_) => "RECONCILIATION_FAILED",
        };

        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::new(error_code, self.0.to_string());
        (status, Json(body)).into_response()
    }
}
