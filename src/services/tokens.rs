// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access and refresh token issuance and verification (HS256 JWTs).
//!
//! The two token kinds are signed with independent secrets, so a refresh
//! token never verifies as an access token or the other way round.
//! Refresh tokens are only half of the story: the session service also
//! requires them to equal the value stored on the user.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::time_utils::unix_now;

/// Access token claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Refresh token claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issue; two refreshes in the same second still differ
    pub jti: String,
}

/// Which key a token is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Why a presented token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token is malformed or has an invalid signature")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    /// Well-formed and signed, but the user it names no longer exists
    #[error("Token subject no longer exists")]
    UnknownSubject,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    access_key: Vec<u8>,
    refresh_key: Vec<u8>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            access_key: config.access_token_secret.clone(),
            refresh_key: config.refresh_token_secret.clone(),
            access_ttl_secs: config.access_token_ttl.as_secs() as i64,
            refresh_ttl_secs: config.refresh_token_ttl.as_secs() as i64,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Create a short-lived access token carrying the user's identity.
    pub fn issue_access(&self, user: &User) -> Result<String, AppError> {
        let now = unix_now();
        let claims = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            iat: now,
            exp: now + self.access_ttl_secs,
        };
        sign(&claims, &self.access_key)
    }

    /// Create a long-lived refresh token carrying only the user ID.
    pub fn issue_refresh(&self, user: &User) -> Result<String, AppError> {
        let now = unix_now();
        let claims = RefreshClaims {
            sub: user.id.clone(),
            iat: now,
            exp: now + self.refresh_ttl_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        sign(&claims, &self.refresh_key)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    /// Check signature and expiry against the key for `kind`.
    pub fn verify<C: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> Result<C, TokenError> {
        let key = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<C>(token, &DecodingKey::from_secret(key), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }
}

fn sign<C: Serialize>(claims: &C, key: &[u8]) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: "user-1".to_string(),
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "Alice Example".to_string(),
            password_hash: "hash".to_string(),
            avatar: "https://cdn/a.png".to_string(),
            cover_image: None,
            refresh_token: None,
            watch_history: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_access_token_carries_identity() {
        let issuer = TokenIssuer::new(&Config::test_default());
        let token = issuer.issue_access(&test_user()).unwrap();

        let claims = issuer.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.full_name, "Alice Example");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let issuer = TokenIssuer::new(&Config::test_default());
        let user = test_user();

        let access = issuer.issue_access(&user).unwrap();
        let refresh = issuer.issue_refresh(&user).unwrap();

        assert_eq!(issuer.verify_refresh(&access), Err(TokenError::Malformed));
        assert_eq!(
            issuer.verify_access(&refresh).map(|c| c.sub),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_refresh_tokens_are_unique_per_issue() {
        let issuer = TokenIssuer::new(&Config::test_default());
        let user = test_user();

        let first = issuer.issue_refresh(&user).unwrap();
        let second = issuer.issue_refresh(&user).unwrap();
        assert_ne!(first, second);
        assert_eq!(issuer.verify_refresh(&second).unwrap().sub, "user-1");
    }

    #[test]
    fn test_garbage_is_malformed() {
        let issuer = TokenIssuer::new(&Config::test_default());
        assert_eq!(
            issuer.verify_access("invalid.token.here").map(|c| c.sub),
            Err(TokenError::Malformed)
        );
    }
}
