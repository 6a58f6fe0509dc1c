// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for tests and local development.
//!
//! Unique usernames and emails are reserved through their own maps so the
//! reservation and the insert cannot interleave with another registration.
//! Refresh-token swaps and email changes run under the user's shard lock.

use crate::db::{ImageField, SwapOutcome, TokenSlot, UserStore};
use crate::error::AppError;
use crate::models::{Subscription, User, Video};
use crate::time_utils::now_rfc3339;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    users: DashMap<String, User>,
    /// username -> user id
    usernames: DashMap<String, String>,
    /// email -> user id
    emails: DashMap<String, String>,
    subscriptions: DashMap<String, Subscription>,
    videos: DashMap<String, Video>,
}

/// In-memory database handle. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_by_index(&self, index: &DashMap<String, String>, key: &str) -> Option<User> {
        let id = index.get(key).map(|entry| entry.value().clone())?;
        self.tables.users.get(&id).map(|user| user.value().clone())
    }
}

impl UserStore for MemoryDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables.users.get(id).map(|user| user.value().clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.user_by_index(&self.tables.usernames, username))
    }

    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let by_username = username.and_then(|u| self.user_by_index(&self.tables.usernames, u));
        Ok(by_username.or_else(|| email.and_then(|e| self.user_by_index(&self.tables.emails, e))))
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let conflict = || AppError::Conflict("User with email or username already exists".into());

        match self.tables.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => return Err(conflict()),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }

        match self.tables.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                self.tables.usernames.remove(&user.username);
                return Err(conflict());
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }

        self.tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: TokenSlot<'_>,
        new_token: Option<&str>,
    ) -> Result<SwapOutcome, AppError> {
        let Some(mut user) = self.tables.users.get_mut(user_id) else {
            return Ok(SwapOutcome::UserMissing);
        };

        if let TokenSlot::Matches(presented) = expected {
            if user.refresh_token.as_deref() != Some(presented) {
                return Ok(SwapOutcome::Stale);
            }
        }

        user.refresh_token = new_token.map(str::to_string);
        user.updated_at = now_rfc3339();
        Ok(SwapOutcome::Swapped)
    }

    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let Some(mut user) = self.tables.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        user.updated_at = now_rfc3339();
        Ok(true)
    }

    async fn update_account_details(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(mut user) = self.tables.users.get_mut(user_id) else {
            return Ok(None);
        };

        // The user's shard lock is held across the reservation move.
        if user.email != email {
            match self.tables.emails.entry(email.to_string()) {
                Entry::Occupied(owner) if owner.get() != user_id => {
                    return Err(AppError::Conflict("Email is already in use".into()));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(user_id.to_string());
                }
            }
            self.tables
                .emails
                .remove_if(&user.email, |_, owner| owner == user_id);
        }

        user.full_name = full_name.to_string();
        user.email = email.to_string();
        user.updated_at = now_rfc3339();
        Ok(Some(user.clone()))
    }

    async fn set_image(
        &self,
        user_id: &str,
        field: ImageField,
        url: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(self.tables.users.get_mut(user_id).map(|mut user| {
            match field {
                ImageField::Avatar => user.avatar = url.to_string(),
                ImageField::CoverImage => user.cover_image = Some(url.to_string()),
            }
            user.updated_at = now_rfc3339();
            user.clone()
        }))
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        self.tables
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn subscriptions_to_channel(
        &self,
        channel_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .tables
            .subscriptions
            .iter()
            .filter(|edge| edge.channel == channel_id)
            .map(|edge| edge.value().clone())
            .collect())
    }

    async fn subscriptions_by_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .tables
            .subscriptions
            .iter()
            .filter(|edge| edge.subscriber == subscriber_id)
            .map(|edge| edge.value().clone())
            .collect())
    }

    async fn get_video(&self, id: &str) -> Result<Option<Video>, AppError> {
        Ok(self.tables.videos.get(id).map(|video| video.value().clone()))
    }

    async fn upsert_video(&self, video: &Video) -> Result<(), AppError> {
        self.tables.videos.insert(video.id.clone(), video.clone());
        Ok(())
    }
}
