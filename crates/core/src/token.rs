//! HMAC-signed, expiring tokens.
//!
//! A token is `base64url(json payload) "." hex(hmac_sha256(key, encoded payload))`.
//! Pricing quotes and delivery handoff codes are both carried this way so
//! the server can trust them when they come back from a client.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::types::DeliveryId;

type HmacSha256 = Hmac<Sha256>;

/// Errors from signing or verifying a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("signing key rejected")]
    Key,
    #[error("token payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A payload with an expiry.
pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;
}

/// Signs and verifies tokens with one secret.
#[derive(Clone)]
pub struct Signer {
    key: Vec<u8>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("key", &"[REDACTED]").finish()
    }
}

impl Signer {
    #[must_use]
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::Key)
    }

    /// Serialize and sign a payload.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encode`] if the payload cannot be serialized.
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, TokenError> {
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{encoded}.{signature}"))
    }

    /// Check the signature and decode the payload, ignoring expiry.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for malformed tokens or a bad signature.
    pub fn open<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let (encoded, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)
    }

    /// Check signature and expiry and decode the payload.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for malformed, forged or expired tokens.
    pub fn verify<T: DeserializeOwned + Expiring>(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<T, TokenError> {
        let payload: T = self.open(token)?;
        if payload.expires_at() <= now {
            return Err(TokenError::Expired(payload.expires_at()));
        }
        Ok(payload)
    }
}

/// Claims carried in a delivery handoff QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct DeliveryCapability {
    /// Delivery this code unlocks.
    #[serde(rename = "d")]
    pub delivery_id: DeliveryId,
    #[serde(rename = "exp")]
    pub expires_at: DateTime<Utc>,
}

impl Expiring for DeliveryCapability {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn capability(ttl: Duration) -> DeliveryCapability {
        DeliveryCapability {
            delivery_id: DeliveryId::random(),
            expires_at: Utc::now() + ttl,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = Signer::new("a-long-test-secret");
        let claims = capability(Duration::hours(1));
        let token = signer.sign(&claims).unwrap();
        let back: DeliveryCapability = signer.verify(&token, Utc::now()).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = Signer::new("a-long-test-secret");
        let token = signer.sign(&capability(Duration::hours(1))).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&capability(Duration::hours(1))).unwrap(),
        );
        let forged = format!("{forged_payload}.{sig}");
        assert!(matches!(
            signer.verify::<DeliveryCapability>(&forged, Utc::now()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_other_key_rejected() {
        let token = Signer::new("one").sign(&capability(Duration::hours(1))).unwrap();
        assert!(matches!(
            Signer::new("two").verify::<DeliveryCapability>(&token, Utc::now()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_expired_rejected() {
        let signer = Signer::new("k");
        let token = signer.sign(&capability(Duration::seconds(-1))).unwrap();
        assert!(matches!(
            signer.verify::<DeliveryCapability>(&token, Utc::now()),
            Err(TokenError::Expired(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let signer = Signer::new("k");
        for token in ["", "abc", "abc.zz", "%%%.00"] {
            assert!(
                matches!(
                    signer.verify::<DeliveryCapability>(token, Utc::now()),
                    Err(TokenError::Malformed | TokenError::BadSignature)
                ),
                "{token}"
            );
        }
    }
}
