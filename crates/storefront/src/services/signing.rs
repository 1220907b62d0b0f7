//! Signed, expiring order links.
//!
//! Used for the payment-page cancel URL, which is followed without an access
//! token. A token is `{order_id}.{issued_at}.{signature}` where the signature
//! is base64url HMAC-SHA256 over `"{order_id}.{issued_at}"`.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use boostedlabs_core::OrderId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("Invalid cancellation link")]
    Malformed,
    #[error("Invalid cancellation link signature")]
    BadSignature,
    #[error("Cancellation link has expired")]
    Expired,
}

/// Issues and verifies order link tokens.
#[derive(Clone)]
pub struct LinkSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LinkSigner {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    fn mac(&self, message: &str) -> Result<HmacSha256, SigningError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SigningError::BadSignature)?;
        mac.update(message.as_bytes());
        Ok(mac)
    }

    /// Sign `order_id` as issued at `issued_at`.
    #[must_use]
    pub fn sign(&self, order_id: OrderId, issued_at: DateTime<Utc>) -> String {
        let message = format!("{order_id}.{}", issued_at.timestamp());
        // HMAC accepts keys of any length
        let signature = self
            .mac(&message)
            .map(|mac| URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("{message}.{signature}")
    }

    /// Verify a token at `now` and return the order it names.
    ///
    /// # Errors
    ///
    /// `Malformed` for anything that is not three dot-separated parts with
    /// numeric IDs, `BadSignature` when the signature does not match and
    /// `Expired` once the TTL has passed.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<OrderId, SigningError> {
        let mut parts = token.split('.');
        let (Some(order), Some(issued), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SigningError::Malformed);
        };

        let order_id: OrderId = order.parse().map_err(|_| SigningError::Malformed)?;
        let issued_at: i64 = issued.parse().map_err(|_| SigningError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SigningError::Malformed)?;

        self.mac(&format!("{order}.{issued}"))?
            .verify_slice(&signature)
            .map_err(|_| SigningError::BadSignature)?;

        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        if now.timestamp().saturating_sub(issued_at) > ttl {
            return Err(SigningError::Expired);
        }

        Ok(order_id)
    }
}
