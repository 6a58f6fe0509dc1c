// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: registration, login, token rotation, logout and
//! profile mutation.
//!
//! Every refresh-token write goes through [`SessionService::issue_session_pair`].
//! Login overwrites the stored token unconditionally; refresh swaps it only
//! if the stored value is still the one presented, so a token that has been
//! rotated or logged out can never be exchanged again.

use std::path::PathBuf;

use subtle::ConstantTimeEq;
use validator::{Validate, ValidationError};

use crate::db::{ImageField, SwapOutcome, TokenSlot, UserStore};
use crate::error::{AppError, Result};
use crate::models::user::normalize_identity;
use crate::models::{PublicUser, User};
use crate::services::media::MediaService;
use crate::services::password;
use crate::services::tokens::{SessionTokens, TokenError, TokenIssuer};
use crate::time_utils::now_rfc3339;
use crate::Store;

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Registration input. Image references point at already-staged files.
#[derive(Debug, Clone, Validate)]
pub struct RegisterInput {
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[validate(custom(function = "not_blank"))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub full_name: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    pub avatar: Option<PathBuf>,
    pub cover_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct ChangePasswordInput {
    #[validate(custom(function = "not_blank"))]
    pub old_password: String,
    #[validate(custom(function = "not_blank"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateAccountInput {
    #[validate(custom(function = "not_blank"))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: PublicUser,
    pub tokens: SessionTokens,
}

/// Orchestrates credential checks, token issuance and store updates.
#[derive(Clone)]
pub struct SessionService<S: Store> {
    db: S,
    tokens: TokenIssuer,
    media: MediaService,
}

impl<S: Store> SessionService<S> {
    pub fn new(db: S, tokens: TokenIssuer, media: MediaService) -> Self {
        Self { db, tokens, media }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    // ─── Registration ────────────────────────────────────────────

    /// Create a user. The returned projection carries no secrets.
    pub async fn register(&self, input: RegisterInput) -> Result<PublicUser> {
        if input.validate().is_err() {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        let username = normalize_identity(&input.username);
        let email = normalize_identity(&input.email);
        let full_name = input.full_name.trim().to_string();

        if self
            .db
            .find_user_by_login(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let avatar_path = input
            .avatar
            .ok_or_else(|| AppError::Validation("Avatar file is required".to_string()))?;

        let avatar = self
            .media
            .upload(&avatar_path)
            .await
            .map_err(|e| upload_failed("avatar", e))?;

        let cover_image = match input.cover_image {
            Some(path) => Some(
                self.media
                    .upload(&path)
                    .await
                    .map_err(|e| upload_failed("cover image", e))?
                    .url,
            ),
            None => None,
        };

        let password_hash = password::hash_async(input.password).await?;
        let now = now_rfc3339();

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            full_name,
            password_hash,
            avatar: avatar.url,
            cover_image,
            refresh_token: None,
            watch_history: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.insert_user(&user).await?;

        let created = self.db.get_user(&user.id).await?.ok_or_else(|| {
            AppError::Database("Something went wrong while registering the user".to_string())
        })?;

        tracing::info!(user_id = %created.id, username = %created.username, "User registered");

        Ok(created.to_public())
    }

    // ─── Login / Rotation ────────────────────────────────────────

    /// Verify credentials and start a session.
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession> {
        let username = input
            .username
            .as_deref()
            .map(normalize_identity)
            .filter(|u| !u.is_empty());
        let email = input
            .email
            .as_deref()
            .map(normalize_identity)
            .filter(|e| !e.is_empty());

        if username.is_none() && email.is_none() {
            return Err(AppError::Validation(
                "Username or email is required".to_string(),
            ));
        }

        let user = self
            .db
            .find_user_by_login(username.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let password = input
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

        if !password::verify_async(password, user.password_hash.clone()).await? {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AppError::Unauthorized("Invalid user credentials".to_string()));
        }

        let tokens = self.issue_session_pair(&user.id, TokenSlot::Any).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthSession {
            user: user.to_public(),
            tokens,
        })
    }

    /// Issue a new access/refresh pair and store the refresh token.
    ///
    /// `expected` guards the write: with `TokenSlot::Matches` the pair is
    /// only handed out if the stored token was still that value.
    pub async fn issue_session_pair(
        &self,
        user_id: &str,
        expected: TokenSlot<'_>,
    ) -> Result<SessionTokens> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let access_token = self.tokens.issue_access(&user)?;
        let refresh_token = self.tokens.issue_refresh(&user)?;

        match self
            .db
            .swap_refresh_token(user_id, expected, Some(&refresh_token))
            .await?
        {
            SwapOutcome::Swapped => {}
            SwapOutcome::Stale => {
                tracing::warn!(user_id, "Refresh token superseded during rotation");
                return Err(AppError::Unauthorized(
                    "Refresh token is expired or used".to_string(),
                ));
            }
            SwapOutcome::UserMissing => {
                return Err(AppError::NotFound("User does not exist".to_string()));
            }
        }

        tracing::debug!(user_id, "Session token pair issued");

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Exchange the current refresh token for a new pair.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<AuthSession> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self.tokens.verify_refresh(presented).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            AppError::from(e)
        })?;

        let user = self
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let current = user.refresh_token.as_deref().unwrap_or("");
        let matches: bool = current.as_bytes().ct_eq(presented.as_bytes()).into();
        if current.is_empty() || !matches {
            tracing::warn!(user_id = %user.id, "Stale refresh token presented");
            return Err(AppError::Unauthorized(
                "Refresh token is expired or used".to_string(),
            ));
        }

        let tokens = self
            .issue_session_pair(&user.id, TokenSlot::Matches(presented))
            .await?;

        tracing::info!(user_id = %user.id, "Session refreshed");

        Ok(AuthSession {
            user: user.to_public(),
            tokens,
        })
    }

    /// End the session by clearing the stored refresh token.
    pub async fn logout(&self, user_id: &str) -> Result<()> {
        match self
            .db
            .swap_refresh_token(user_id, TokenSlot::Any, None)
            .await?
        {
            SwapOutcome::UserMissing => {
                Err(AppError::NotFound("User does not exist".to_string()))
            }
            _ => {
                tracing::info!(user_id, "User logged out");
                Ok(())
            }
        }
    }

    /// Replace the password after checking the old one.
    ///
    /// The stored refresh token is left alone: existing sessions survive a
    /// password change.
    pub async fn change_password(&self, user_id: &str, input: ChangePasswordInput) -> Result<()> {
        if input.validate().is_err() {
            return Err(AppError::Validation(
                "Old and new password are required".to_string(),
            ));
        }

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !password::verify_async(input.old_password, user.password_hash.clone()).await? {
            return Err(AppError::Unauthorized("Invalid old password".to_string()));
        }

        let new_hash = password::hash_async(input.new_password).await?;
        if !self.db.set_password_hash(user_id, &new_hash).await? {
            return Err(AppError::NotFound("User does not exist".to_string()));
        }

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    // ─── Request Authentication ──────────────────────────────────

    /// Resolve an access token to the current user.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<PublicUser> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self.tokens.verify_access(token)?;

        let user = self
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or(TokenError::UnknownSubject)?;

        Ok(user.to_public())
    }

    // ─── Profile Mutation ────────────────────────────────────────

    pub async fn update_account(
        &self,
        user_id: &str,
        input: UpdateAccountInput,
    ) -> Result<PublicUser> {
        if input.validate().is_err() {
            return Err(AppError::Validation(
                "Full name and a valid email are required".to_string(),
            ));
        }

        let email = normalize_identity(&input.email);
        let user = self
            .db
            .update_account_details(user_id, input.full_name.trim(), &email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        tracing::info!(user_id, "Account details updated");
        Ok(user.to_public())
    }

    pub async fn update_avatar(&self, user_id: &str, path: Option<PathBuf>) -> Result<PublicUser> {
        self.replace_image(user_id, ImageField::Avatar, path).await
    }

    pub async fn update_cover_image(
        &self,
        user_id: &str,
        path: Option<PathBuf>,
    ) -> Result<PublicUser> {
        self.replace_image(user_id, ImageField::CoverImage, path)
            .await
    }

    async fn replace_image(
        &self,
        user_id: &str,
        field: ImageField,
        path: Option<PathBuf>,
    ) -> Result<PublicUser> {
        let label = match field {
            ImageField::Avatar => "avatar",
            ImageField::CoverImage => "cover image",
        };

        let path =
            path.ok_or_else(|| AppError::Validation(format!("The {} file is missing", label)))?;

        let uploaded = self
            .media
            .upload(&path)
            .await
            .map_err(|e| upload_failed(label, e))?;

        let user = self
            .db
            .set_image(user_id, field, &uploaded.url)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        tracing::info!(user_id, field = label, "Profile image replaced");
        Ok(user.to_public())
    }
}

/// Keep store failures as they are; anything else from the object store is
/// reported as an upload failure for the named image.
fn upload_failed(label: &str, err: AppError) -> AppError {
    match err {
        AppError::Upload(detail) => {
            tracing::warn!(image = label, error = %detail, "Upload failed");
            AppError::Upload(format!("Failed to upload {}", label))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_blank() {
        assert!(not_blank("x").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("").is_err());
    }

    #[test]
    fn test_register_input_validation() {
        let input = RegisterInput {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "  ".to_string(),
            password: "p1".to_string(),
            avatar: None,
            cover_image: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_update_account_requires_email_shape() {
        let input = UpdateAccountInput {
            full_name: "Alice".to_string(),
            email: "not-an-email".to_string(),
        };
        assert!(input.validate().is_err());
    }
}
