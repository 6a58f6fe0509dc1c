//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User record as stored.
///
/// `password_hash` and `refresh_token` never leave the service; API
/// responses go through [`PublicUser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-generated ID (also used as document ID)
    pub id: String,
    /// Unique, trimmed, lowercase
    pub username: String,
    /// Unique, trimmed, lowercase
    pub email: String,
    pub full_name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Avatar URL in the object store
    pub avatar: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Most recently issued refresh token, `None` after logout
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Video IDs, oldest first
    #[serde(default)]
    pub watch_history: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Projection with secrets removed.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            watch_history: self.watch_history.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// User as returned by the API (no password hash, no refresh token).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub watch_history: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalize a username or email the way the store indexes it.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}
