//! Subscription repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::billing::{Subscription, SubscriptionChange};
use crate::domain::foundation::DomainError;

/// Persistence for subscription state.
///
/// The lookup methods mirror the routing keys of reconciliation: provider
/// subscription id first, then provider customer id, then user id.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Upserts keyed on the provider subscription id. The change must
    /// carry one.
    async fn upsert_by_subscription_id(
        &self,
        change: &SubscriptionChange,
    ) -> Result<Uuid, DomainError>;

    /// Finds a row by provider subscription id.
    async fn find_id_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Uuid>, DomainError>;

    /// Finds a row by provider customer id.
    async fn find_id_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError>;

    /// Finds the most recently updated row for a user.
    async fn find_latest_id_by_user_id(&self, user_id: &str) -> Result<Option<Uuid>, DomainError>;

    /// Applies a change to an existing row. Absent fields in the change
    /// leave stored values untouched.
    async fn update_by_id(&self, id: Uuid, change: &SubscriptionChange) -> Result<(), DomainError>;

    /// Inserts a fresh row.
    async fn insert(&self, change: &SubscriptionChange) -> Result<Uuid, DomainError>;

    /// Loads the most recently updated subscription for a user, for
    /// entitlement derivation.
    async fn find_latest_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;
}
