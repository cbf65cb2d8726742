//! Signed token construction and verification.
//!
//! A token is `salt.timestamp.signature`:
//!
//! - `salt`: standard base64 of 32 random bytes
//! - `timestamp`: issue time, milliseconds since the Unix epoch, in decimal
//! - `signature`: standard base64 of HMAC-SHA256 over `salt.timestamp`

use crate::error::{CsrfError, Result, TokenRejection};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::Duration;
use tracing::trace;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a token salt.
pub const SALT_LEN: usize = 32;

/// Issues and verifies signed tokens.
///
/// The MAC is keyed once at construction and cloned for every operation, so
/// a codec can be shared between threads without locking.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec keyed with `secret`.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(CsrfError::InvalidKey("secret must not be empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CsrfError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Issue a token stamped with the current time.
    pub fn issue(&self) -> String {
        self.issue_at(now_millis())
    }

    /// Issue a token stamped with `now_ms`.
    pub fn issue_at(&self, now_ms: i64) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let payload = format!("{}.{}", STANDARD.encode(salt), now_ms);
        let signature = STANDARD.encode(self.sign(payload.as_bytes()));
        format!("{payload}.{signature}")
    }

    /// Verify a token's structure, signature and age.
    ///
    /// Returns the token timestamp on success. A token is still valid when
    /// exactly `timeout` has elapsed since issue.
    pub fn verify(
        &self,
        token: &str,
        now_ms: i64,
        timeout: Duration,
    ) -> std::result::Result<i64, TokenRejection> {
        let parts: Vec<&str> = token.split('.').collect();
        let [salt, timestamp, signature] = parts.as_slice() else {
            trace!(segments = parts.len(), "Token has the wrong number of segments");
            return Err(TokenRejection::Malformed);
        };

        // MIME-style encoders may wrap long output
        let signature: String = signature
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let provided = STANDARD.decode(signature).map_err(|e| {
            trace!(error = %e, "Token signature is not valid base64");
            TokenRejection::BadSignature
        })?;

        let mut mac = self.mac.clone();
        mac.update(salt.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        if mac.verify_slice(&provided).is_err() {
            trace!("Token signature does not match");
            return Err(TokenRejection::BadSignature);
        }

        let issued_at = parse_timestamp(timestamp).ok_or(TokenRejection::Expired)?;
        if is_expired(issued_at, now_ms, timeout) {
            trace!(issued_at, now_ms, "Token expired");
            return Err(TokenRejection::Expired);
        }
        Ok(issued_at)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Read the timestamp segment of a token without checking its signature.
///
/// Returns `None` when the segment is missing, blank or not an integer.
pub fn timestamp_of(token: &str) -> Option<i64> {
    token.split('.').nth(1).and_then(parse_timestamp)
}

/// `true` when more than `timeout` has elapsed between `issued_at` and `now_ms`.
pub fn is_expired(issued_at: i64, now_ms: i64, timeout: Duration) -> bool {
    let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(issued_at) > timeout_ms
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    match s.parse::<i64>() {
        Ok(ts) => Some(ts),
        Err(e) => {
            trace!(error = %e, "Invalid token timestamp");
            None
        }
    }
}
