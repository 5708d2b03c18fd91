//! Webhook signature verification and payload digests.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::webhook_errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies provider webhook signatures.
///
/// The provider signs the raw request body with HMAC-SHA256 and sends the
/// lowercase hex digest in the `creem-signature` header. There is no
/// timestamp component in this scheme.
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies the signature header against the raw request body.
    ///
    /// Comparison is constant-time over the decoded digest bytes. A header
    /// that is not valid hex fails the same way as a wrong signature.
    pub fn verify(&self, body: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let provided = hex::decode(signature_header.trim())
            .map_err(|_| WebhookError::InvalidSignature("signature is not valid hex".into()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| WebhookError::InvalidSignature(format!("invalid secret: {}", e)))?;
        mac.update(body);
        let expected = mac.finalize().into_bytes();

        if expected.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature(
                "signature does not match payload".into(),
            ))
        }
    }
}

/// SHA-256 hex digest of the raw payload bytes.
///
/// This digest is the dedup key for the event store: two deliveries with
/// byte-identical bodies collide on it regardless of provider event id.
pub fn payload_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Computes the hex signature a provider would send for `body`.
#[cfg(test)]
pub fn compute_test_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
