//! Event reconciliation.
//!
//! Takes a normalized event and converges stored state: resolves the user,
//! routes the subscription write by the strongest available key, syncs the
//! denormalized profile plan, and records invoices. Reconciliation is
//! last-write-wins per delivery; the engine does not order events by
//! provider timestamps.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::billing::{
    CancellationDetails, EventType, IdentityHints, InvoiceSnapshot, NormalizedEvent,
    SubscriptionChange, SubscriptionPatch, WebhookError,
};
use crate::domain::foundation::DomainError;
use crate::ports::{InvoiceRepository, ProfileRepository, SubscriptionRepository};

/// Which key routed the subscription write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKey {
    SubscriptionId,
    CustomerId,
    UserId,
}

/// What a reconciliation pass actually did.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub user_id: Option<String>,
    pub routed_by: Option<UpsertKey>,
    pub subscription_written: bool,
    pub profile_synced: bool,
    pub invoice_written: bool,
}

/// Command handler converging billing state from one normalized event.
#[derive(Clone)]
pub struct ReconcileEvent {
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl ReconcileEvent {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            invoices,
        }
    }

    /// Reconciles one event. Subscription and profile writes propagate
    /// failures; invoice recording is best-effort and only warns, so a
    /// broken invoice payload cannot block a plan change.
    pub async fn execute(&self, event: &NormalizedEvent) -> Result<ReconcileSummary, WebhookError> {
        let mut summary = ReconcileSummary::default();

        if event.event_type == EventType::Unknown {
            debug!("Unknown event type, nothing to reconcile");
            return Ok(summary);
        }

        summary.user_id = self.resolve_user_id(&event.identity).await?;

        if event.event_type.affects_subscription() {
            self.apply_subscription(event, &mut summary).await?;
            self.sync_profile_plan(event, &mut summary).await?;
        }

        if let Some(snapshot) = &event.invoice {
            match self.invoices.upsert(snapshot).await {
                Ok(()) => summary.invoice_written = true,
                Err(e) => warn!(
                    invoice_id = %snapshot.invoice_id,
                    error = %e,
                    "Failed to record invoice, continuing"
                ),
            }
            if let Err(e) = self.associate_invoice(snapshot, summary.user_id.as_deref()).await {
                warn!(
                    invoice_id = %snapshot.invoice_id,
                    error = %e,
                    "Failed to associate invoice ids, continuing"
                );
            }
        }

        Ok(summary)
    }

    /// Resolves the acting user. The metadata user id chain is exhausted
    /// before any email lookup runs.
    async fn resolve_user_id(
        &self,
        identity: &IdentityHints,
    ) -> Result<Option<String>, DomainError> {
        if let Some(user_id) = &identity.metadata_user_id {
            return Ok(Some(user_id.clone()));
        }
        for email in &identity.email_candidates {
            if let Some(user_id) = self.profiles.find_user_id_by_email(email).await? {
                return Ok(Some(user_id));
            }
        }
        Ok(None)
    }

    /// Routes the subscription write by the strongest key available:
    /// provider subscription id, then provider customer id, then user id.
    /// With no key at all the event is unroutable and skipped with a
    /// warning.
    async fn apply_subscription(
        &self,
        event: &NormalizedEvent,
        summary: &mut ReconcileSummary,
    ) -> Result<(), DomainError> {
        let patch = &event.subscription;
        if patch.is_empty() && summary.user_id.is_none() {
            debug!(event_type = %event.event_type, "No subscription data to apply");
            return Ok(());
        }

        let change = SubscriptionChange {
            user_id: summary.user_id.clone(),
            patch: patch.clone(),
            cancellation: cancellation_for(event),
        };

        if patch.subscription_id.is_some() {
            self.subscriptions.upsert_by_subscription_id(&change).await?;
            summary.routed_by = Some(UpsertKey::SubscriptionId);
            summary.subscription_written = true;
        } else if let Some(customer_id) = &patch.customer_id {
            match self.subscriptions.find_id_by_customer_id(customer_id).await? {
                Some(id) => self.subscriptions.update_by_id(id, &change).await?,
                None => {
                    self.subscriptions.insert(&change).await?;
                }
            }
            summary.routed_by = Some(UpsertKey::CustomerId);
            summary.subscription_written = true;
        } else if let Some(user_id) = &summary.user_id {
            match self.subscriptions.find_latest_id_by_user_id(user_id).await? {
                Some(id) => self.subscriptions.update_by_id(id, &change).await?,
                None => {
                    self.subscriptions.insert(&change).await?;
                }
            }
            summary.routed_by = Some(UpsertKey::UserId);
            summary.subscription_written = true;
        } else {
            warn!(
                event_type = %event.event_type,
                "Subscription event carries no routing key, skipping"
            );
        }

        if summary.subscription_written {
            info!(
                event_type = %event.event_type,
                routed_by = ?summary.routed_by,
                "Subscription state reconciled"
            );
        }
        Ok(())
    }

    /// Denormalizes the plan onto the profile when both the user and the
    /// plan are known.
    async fn sync_profile_plan(
        &self,
        event: &NormalizedEvent,
        summary: &mut ReconcileSummary,
    ) -> Result<(), DomainError> {
        let (Some(user_id), Some(plan)) = (&summary.user_id, event.subscription.plan) else {
            return Ok(());
        };
        let updated = self
            .profiles
            .set_plan(
                user_id,
                plan.as_str(),
                event.subscription.current_period_end,
            )
            .await?;
        if updated {
            summary.profile_synced = true;
        } else {
            warn!(user_id = %user_id, "No profile row for user, plan not synced");
        }
        Ok(())
    }

    /// Links an invoice's provider ids back to subscription rows. Never
    /// touches the plan: a row matched by subscription id is left alone, a
    /// row matched by customer id only learns the subscription id, and
    /// with no match at all a bare linkage row is inserted.
    async fn associate_invoice(
        &self,
        snapshot: &InvoiceSnapshot,
        user_id: Option<&str>,
    ) -> Result<(), DomainError> {
        if let Some(sid) = &snapshot.subscription_id {
            if self
                .subscriptions
                .find_id_by_subscription_id(sid)
                .await?
                .is_some()
            {
                return Ok(());
            }
        }

        if let Some(customer_id) = &snapshot.customer_id {
            if let Some(id) = self.subscriptions.find_id_by_customer_id(customer_id).await? {
                if snapshot.subscription_id.is_some() {
                    let change = SubscriptionChange {
                        user_id: None,
                        patch: SubscriptionPatch {
                            subscription_id: snapshot.subscription_id.clone(),
                            ..Default::default()
                        },
                        cancellation: CancellationDetails::default(),
                    };
                    self.subscriptions.update_by_id(id, &change).await?;
                }
                return Ok(());
            }
        }

        if snapshot.subscription_id.is_some() || snapshot.customer_id.is_some() {
            let change = SubscriptionChange {
                user_id: user_id.map(String::from),
                patch: SubscriptionPatch {
                    subscription_id: snapshot.subscription_id.clone(),
                    customer_id: snapshot.customer_id.clone(),
                    ..Default::default()
                },
                cancellation: CancellationDetails::default(),
            };
            self.subscriptions.insert(&change).await?;
        }
        Ok(())
    }
}

/// Cancellation intent for canceled events. The provider reports the
/// cancellation when it is requested, with service continuing until the
/// period end.
fn cancellation_for(event: &NormalizedEvent) -> CancellationDetails {
    if event.event_type == EventType::SubscriptionCanceled {
        CancellationDetails {
            requested_at: Some(Utc::now()),
            mode: Some("at_period_end".to_string()),
            effective_at: event.subscription.current_period_end,
        }
    } else {
        CancellationDetails::default()
    }
}
