// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing and verification (Argon2id, PHC strings).
//!
//! Hashing is CPU-bound, so the async wrappers run it on tokio's blocking
//! pool instead of stalling the request executor.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password and hash are required")]
    MissingInput,

    #[error("Stored password hash is invalid")]
    InvalidHash,

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::MissingInput => AppError::Validation(err.to_string()),
            PasswordError::InvalidHash | PasswordError::HashingFailed(_) => {
                AppError::Internal(anyhow::anyhow!(err))
            }
        }
    }
}

/// Hash a password with a fresh random salt.
pub fn hash(plaintext: &str) -> Result<String, PasswordError> {
    if plaintext.is_empty() {
        return Err(PasswordError::MissingInput);
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Check a password against a stored digest.
///
/// Empty input is an error, not a mismatch. The digest comparison inside
/// argon2 is constant-time.
pub fn verify(plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
    if plaintext.is_empty() || digest.is_empty() {
        return Err(PasswordError::MissingInput);
    }
    let parsed = PasswordHash::new(digest).map_err(|_| PasswordError::InvalidHash)?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::HashingFailed(e.to_string())),
    }
}

/// [`hash`] on the blocking pool.
pub async fn hash_async(plaintext: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(&plaintext))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

/// [`verify`] on the blocking pool.
pub async fn verify_async(plaintext: String, digest: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(&plaintext, &digest))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))?
        .map_err(AppError::from)
}
