//! Entitlement lookup.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::billing::{derive_entitlements, Entitlements};
use crate::domain::foundation::DomainError;
use crate::ports::SubscriptionRepository;

/// Query handler deriving a user's effective entitlements from their
/// latest subscription row.
#[derive(Clone)]
pub struct GetEntitlements {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl GetEntitlements {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    pub async fn execute(&self, user_id: &str) -> Result<Entitlements, DomainError> {
        let subscription = self.subscriptions.find_latest_for_user(user_id).await?;
        Ok(derive_entitlements(subscription.as_ref(), Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::InMemorySubscriptionRepo;
    use crate::domain::billing::{SubscriptionChange, SubscriptionPatch};
    use crate::domain::billing::Plan;
    use crate::ports::SubscriptionRepository as _;
    use chrono::Duration;

    #[tokio::test]
    async fn user_without_subscription_is_free() {
        let handler = GetEntitlements::new(Arc::new(InMemorySubscriptionRepo::default()));
        let ent = handler.execute("user-none").await.unwrap();
        assert_eq!(ent.plan, "free");
        assert_eq!(ent.daily_requests, 50);
    }

    #[tokio::test]
    async fn active_subscription_grants_plan() {
        let repo = Arc::new(InMemorySubscriptionRepo::default());
        repo.insert(&SubscriptionChange {
            user_id: Some("user-a".to_string()),
            patch: SubscriptionPatch {
                subscription_id: Some("sub_a".to_string()),
                plan: Some(Plan::Team),
                status: Some("active".to_string()),
                current_period_end: Some(Utc::now() + Duration::days(30)),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();

        let handler = GetEntitlements::new(repo);
        let ent = handler.execute("user-a").await.unwrap();
        assert_eq!(ent.plan, "team");
        assert_eq!(ent.daily_requests, 5000);
        assert_eq!(ent.status.as_deref(), Some("active"));
        assert!(ent.current_period_end.is_some());
    }

    #[tokio::test]
    async fn latest_subscription_wins() {
        let repo = Arc::new(InMemorySubscriptionRepo::default());
        let base = SubscriptionChange {
            user_id: Some("user-b".to_string()),
            patch: SubscriptionPatch {
                subscription_id: Some("sub_old".to_string()),
                plan: Some(Plan::Pro),
                status: Some("canceled".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        repo.insert(&base).await.unwrap();
        let mut newer = base.clone();
        newer.patch.subscription_id = Some("sub_new".to_string());
        newer.patch.plan = Some(Plan::Team);
        newer.patch.status = Some("active".to_string());
        repo.insert(&newer).await.unwrap();

        let handler = GetEntitlements::new(repo);
        let ent = handler.execute("user-b").await.unwrap();
        assert_eq!(ent.plan, "team");
    }
}
