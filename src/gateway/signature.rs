use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Checks gateway payment signatures: `hex(HMAC-SHA256(secret, "order_id|payment_id"))`.
#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
}

impl SignatureVerifier {
    pub fn new(secret: &str) -> Result<Self, ServiceError> {
        if secret.is_empty() {
            return Err(ServiceError::InternalError(
                "payment signing secret is not configured".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("invalid signing key: {}", e)))?;
        Ok(Self { mac })
    }

    fn keyed(&self, order_id: &str, payment_id: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac
    }

    /// Lowercase hex signature, as the gateway produces it.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        hex::encode(self.keyed(order_id, payment_id).finalize().into_bytes())
    }

    /// Constant-time comparison; malformed hex is simply a mismatch.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        self.keyed(order_id, payment_id)
            .verify_slice(&provided)
            .is_ok()
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignatureVerifier")
    }
}
