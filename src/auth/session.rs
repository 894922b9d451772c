//! Signed, short-lived session tokens.
//!
//! A token is `nonce.issued_at.signature`: a random base64url nonce, the UNIX
//! issue time in seconds, and the hex HMAC-SHA256 of `nonce.issued_at` under
//! the process secret. Nothing is stored server side; a restart with a fresh
//! secret invalidates every outstanding token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::Duration;
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_BYTES: usize = 32;

/// Session error types.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid session secret: {0}")]
    InvalidSecret(String),
}

/// Expected login credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub passphrase: String,
}

/// Issues and verifies session tokens.
pub struct Authenticator {
    mac: HmacSha256,
    ttl: Duration,
    credentials: Option<Credentials>,
}

impl Authenticator {
    pub fn new(
        secret: &[u8],
        ttl: Duration,
        credentials: Option<Credentials>,
    ) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::InvalidSecret("secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| SessionError::InvalidSecret(e.to_string()))?;

        Ok(Self {
            mac,
            ttl,
            credentials,
        })
    }

    /// Build an authenticator with a fresh random secret.
    pub fn with_random_secret(
        ttl: Duration,
        credentials: Option<Credentials>,
    ) -> Result<Self, SessionError> {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret, ttl, credentials)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Constant-time check of a username and passphrase.
    ///
    /// Always false when no credentials are configured.
    pub fn check_auth(&self, username: &str, passphrase: &str) -> bool {
        let Some(expected) = &self.credentials else {
            return false;
        };
        let user_ok = digest_eq(username, &expected.username);
        let pass_ok = digest_eq(passphrase, &expected.passphrase);
        (user_ok & pass_ok).into()
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> String {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let payload = format!("{}.{}", URL_SAFE_NO_PAD.encode(nonce), now.timestamp());
        let signature = hex::encode(self.sign(&payload).finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }

    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let parts: Vec<&str> = token.split('.').collect();
        let [nonce, issued, signature] = parts.as_slice() else {
            return false;
        };
        if nonce.is_empty() {
            return false;
        }
        let Ok(issued_at) = issued.parse::<i64>() else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        let payload = format!("{}.{}", nonce, issued);
        if self.sign(&payload).verify_slice(&signature).is_err() {
            return false;
        }

        let age = now.timestamp().saturating_sub(issued_at);
        age.unsigned_abs() <= self.ttl.as_secs()
    }

    fn sign(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac
    }
}

/// Compare digests so timing depends on neither content nor length.
fn digest_eq(given: &str, expected: &str) -> Choice {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given.as_slice().ct_eq(expected.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const TTL: Duration = Duration::from_secs(300);

    fn authenticator() -> Authenticator {
        Authenticator::new(
            b"test-secret",
            TTL,
            Some(Credentials {
                username: "admin".to_string(),
                passphrase: "correct horse".to_string(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let auth = authenticator();
        let t = Utc::now();
        let token = auth.issue_at(t);

        assert!(auth.validate_at(&token, t + ChronoDuration::seconds(1)));
        assert!(auth.validate_at(&token, t + ChronoDuration::seconds(300)));
        assert!(!auth.validate_at(&token, t + ChronoDuration::seconds(301)));
    }

    #[test]
    fn test_far_future_token_rejected() {
        let auth = authenticator();
        let t = Utc::now();
        let token = auth.issue_at(t + ChronoDuration::seconds(3600));
        assert!(!auth.validate_at(&token, t));
    }

    #[test]
    fn test_any_flipped_signature_character_invalidates() {
        let auth = authenticator();
        let t = Utc::now();
        let token = auth.issue_at(t);
        let sig_start = token.rfind('.').unwrap() + 1;

        for i in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(!auth.validate_at(&tampered, t), "position {}", i);
        }
    }

    #[test]
    fn test_tampered_payload_invalidates() {
        let auth = authenticator();
        let t = Utc::now();
        let token = auth.issue_at(t);
        let parts: Vec<&str> = token.split('.').collect();

        // Pushing the issue time forward must break the signature
        let extended = format!("{}.{}.{}", parts[0], t.timestamp() + 600, parts[2]);
        assert!(!auth.validate_at(&extended, t + ChronoDuration::seconds(601)));
    }

    #[test]
    fn test_malformed_tokens() {
        let auth = authenticator();
        let t = Utc::now();
        for token in ["", "abc", "a.b", "a.b.c.d", ".1.00", "n.notanumber.00", "n.1.zz"] {
            assert!(!auth.validate_at(token, t), "{:?}", token);
        }
    }

    #[test]
    fn test_other_secret_rejected() {
        let t = Utc::now();
        let token = authenticator().issue_at(t);
        let other = Authenticator::new(b"another-secret", TTL, None).unwrap();
        assert!(!other.validate_at(&token, t));
    }

    #[test]
    fn test_tokens_are_unique() {
        let auth = authenticator();
        let t = Utc::now();
        assert_ne!(auth.issue_at(t), auth.issue_at(t));
    }

    #[test]
    fn test_check_auth() {
        let auth = authenticator();
        assert!(auth.check_auth("admin", "correct horse"));
        assert!(!auth.check_auth("admin", "wrong"));
        assert!(!auth.check_auth("root", "correct horse"));
        assert!(!auth.check_auth("", ""));
    }

    #[test]
    fn test_check_auth_without_credentials() {
        let auth = Authenticator::new(b"s", TTL, None).unwrap();
        assert!(!auth.check_auth("", ""));
        assert!(!auth.check_auth("admin", "anything"));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(Authenticator::new(b"", TTL, None).is_err());
    }
}
