//! Payment provider configuration (Creem)

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;

/// Payment provider configuration.
///
/// The webhook signing secret is mandatory: signature verification fails
/// closed, so a process without a secret must refuse to start rather than
/// accept unverifiable deliveries.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Webhook signing secret shared with the provider
    pub webhook_secret: Secret<String>,

    /// Provider API base (kept for operator reference; the outbound client
    /// lives outside this service)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Provider product id mapped to the "pro" plan
    pub pro_product_id: Option<String>,

    /// Provider product id mapped to the "team" plan
    pub team_product_id: Option<String>,
}

impl PaymentConfig {
    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"));
        }
        if !self.api_base.starts_with("https://") {
            return Err(ValidationError::InvalidApiBase);
        }
        Ok(())
    }
}

fn default_api_base() -> String {
    "https://api.creem.io".to_string()
}
