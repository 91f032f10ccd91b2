//! Bearer token issuing and decoding
//!
//! Tokens are HS256 JWTs carrying the user id, email, issue time and expiry.
//! They are not stored anywhere; decoding only proves the signature and
//! expiry. Callers still have to look the user up (see `UserService::verify`).

use anyhow::{anyhow, Context};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::models::User;

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// A freshly signed token
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Signs and decodes bearer tokens with a shared secret
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    /// Issuer whose tokens live for `days` days.
    ///
    /// Out-of-range values saturate; `issue` then fails instead of overflowing.
    pub fn with_days(secret: &str, days: i64) -> Self {
        Self::new(secret, Duration::try_days(days).unwrap_or(Duration::MAX))
    }

    pub fn issue(&self, user: &User) -> ServiceResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| anyhow!("Token lifetime of {} overflows the clock", self.lifetime))?;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to sign token")?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature and expiry.
    pub fn decode(&self, token: &str) -> ServiceResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                ServiceError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn user() -> User {
        let mut user = User::new(
            "ada".to_string(),
            "ada@example.com".to_string(),
            "Ada".to_string(),
            "hash".to_string(),
            UserRole::User,
        );
        user.id = 42;
        user
    }

    #[test]
    fn test_issue_and_decode() {
        let issuer = TokenIssuer::with_days("secret", 7);
        let issued = issuer.issue(&user()).unwrap();

        let claims = issuer.decode(&issued.token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = TokenIssuer::with_days("secret", 7);
        let a = issuer.issue(&user()).unwrap();
        let b = issuer.issue(&user()).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::with_days("secret", 7).issue(&user()).unwrap().token;
        let other = TokenIssuer::with_days("another-secret", 7);
        assert!(matches!(other.decode(&token), Err(ServiceError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("secret", Duration::days(-1));
        let token = issuer.issue(&user()).unwrap().token;
        assert!(matches!(issuer.decode(&token), Err(ServiceError::InvalidToken)));
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let issuer = TokenIssuer::with_days("secret", 100_000_000);
        let err = issuer.issue(&user()).unwrap_err();
        assert_eq!(err.kind(), "InternalError");

        let issuer = TokenIssuer::with_days("secret", i64::MAX);
        assert!(issuer.issue(&user()).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let issuer = TokenIssuer::with_days("secret", 7);
        assert!(matches!(issuer.decode("not.a.jwt"), Err(ServiceError::InvalidToken)));
        assert!(matches!(issuer.decode(""), Err(ServiceError::InvalidToken)));
    }
}
