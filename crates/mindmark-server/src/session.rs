//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the user ID as `sub` and a one-hour `exp`.
//! There is no revocation list: a token stays valid until it expires.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::store::{Store, UserId};

/// Session lifetime in seconds.
pub const SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens with a process-wide signing secret.
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionTokens {
    /// Fails with `AppError::Config` if `secret` is empty or whitespace.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.trim().is_empty() {
            return Err(AppError::Config("session signing secret is not set".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn issue(&self, user: &UserId) -> Result<String> {
        self.issue_at(user, Store::now())
    }

    /// Issue a token as if it were minted at `issued_at` (Unix seconds).
    pub fn issue_at(&self, user: &UserId, issued_at: i64) -> Result<String> {
        let claims = Claims {
            sub: user.0.clone(),
            iat: issued_at,
            exp: issued_at + SESSION_TTL_SECS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Config(format!("sign session token: {e}")))
    }

    /// Check signature and expiry, returning the embedded user ID.
    pub fn verify(&self, token: &str) -> Result<UserId> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "rejected session token");
            AppError::InvalidToken
        })?;
        if data.claims.sub.is_empty() {
            return Err(AppError::InvalidToken);
        }
        Ok(UserId(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId("65a1f0c2b4e8d9a7c3f1e2d4".into())
    }

    #[test]
    fn empty_secret_is_config_error() {
        assert!(matches!(SessionTokens::new(""), Err(AppError::Config(_))));
        assert!(matches!(SessionTokens::new("   "), Err(AppError::Config(_))));
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let tokens = SessionTokens::new("test-secret").unwrap();
        let token = tokens.issue(&user()).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), user());
    }

    #[test]
    fn token_valid_just_before_expiry() {
        let tokens = SessionTokens::new("test-secret").unwrap();
        let token = tokens
            .issue_at(&user(), Store::now() - SESSION_TTL_SECS + 30)
            .unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), user());
    }

    #[test]
    fn expired_token_rejected() {
        let tokens = SessionTokens::new("test-secret").unwrap();
        let token = tokens
            .issue_at(&user(), Store::now() - SESSION_TTL_SECS - 1)
            .unwrap();
        assert!(matches!(tokens.verify(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let a = SessionTokens::new("secret-a").unwrap();
        let b = SessionTokens::new("secret-b").unwrap();
        let token = a.issue(&user()).unwrap();
        assert!(matches!(b.verify(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn malformed_token_rejected() {
        let tokens = SessionTokens::new("test-secret").unwrap();
        assert!(matches!(tokens.verify("garbage"), Err(AppError::InvalidToken)));
        assert!(matches!(tokens.verify(""), Err(AppError::InvalidToken)));
    }

    #[test]
    fn tampered_payload_rejected() {
        let tokens = SessionTokens::new("test-secret").unwrap();
        let token = tokens.issue(&user()).unwrap();
        let other = tokens.issue(&UserId("someone-else".into())).unwrap();
        let other_payload = other.split('.').nth(1).unwrap().to_owned();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &other_payload;
        assert!(matches!(
            tokens.verify(&parts.join(".")),
            Err(AppError::InvalidToken)
        ));
    }
}
