//! Profile repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Persistence for user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Resolves a user id by email, case-insensitively.
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<String>, DomainError>;

    /// Writes the denormalized plan onto the profile. Returns false when
    /// no profile row exists for the user; that is not an error.
    async fn set_plan(
        &self,
        user_id: &str,
        plan: &str,
        plan_expires: Option<DateTime<Utc>>,
    ) -> Result<bool, DomainError>;
}
