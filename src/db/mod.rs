//! Database layer.
//!
//! [`UserStore`] is the seam between the services and a backend. Two
//! backends implement it: [`FirestoreDb`] for production and [`MemoryDb`]
//! for tests and local development.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Subscription, User, Video};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const VIDEOS: &str = "videos";
    /// Unique-index reservations, keyed by normalized username
    pub const USERNAMES: &str = "usernames";
    /// Unique-index reservations, keyed by normalized email
    pub const EMAILS: &str = "emails";
}

/// Expected current value of a user's refresh-token field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot<'a> {
    /// Overwrite whatever is stored (login, logout)
    Any,
    /// Overwrite only if the stored token is exactly this one (rotation)
    Matches(&'a str),
}

/// Image fields that can be replaced after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    Avatar,
    CoverImage,
}

/// Outcome of a conditional refresh-token write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Swapped,
    /// Stored token did not match the expected slot
    Stale,
    UserMissing,
}

/// Credential and relational store.
///
/// Implementations enforce username/email uniqueness at insert time and make
/// the refresh-token swap atomic with respect to other swaps for the same user.
#[trait_variant::make(UserStore: Send)]
pub trait LocalUserStore {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// First user whose username OR email matches. Either may be absent.
    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError>;

    /// Insert a new user; `AppError::Conflict` if username or email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    /// Conditionally replace the stored refresh token.
    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: TokenSlot<'_>,
        new_token: Option<&str>,
    ) -> Result<SwapOutcome, AppError>;

    /// Replace the password hash. `false` if the user does not exist.
    async fn set_password_hash(&self, user_id: &str, password_hash: &str)
        -> Result<bool, AppError>;

    /// Update name and email; `AppError::Conflict` if the email belongs to someone else.
    async fn update_account_details(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, AppError>;

    async fn set_image(
        &self,
        user_id: &str,
        field: ImageField,
        url: &str,
    ) -> Result<Option<User>, AppError>;

    // ─── Subscriptions ───────────────────────────────────────────

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError>;

    /// Edges where `channel == channel_id`.
    async fn subscriptions_to_channel(&self, channel_id: &str)
        -> Result<Vec<Subscription>, AppError>;

    /// Edges where `subscriber == subscriber_id`.
    async fn subscriptions_by_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<Subscription>, AppError>;

    // ─── Videos ──────────────────────────────────────────────────

    async fn get_video(&self, id: &str) -> Result<Option<Video>, AppError>;

    async fn upsert_video(&self, video: &Video) -> Result<(), AppError>;
}
