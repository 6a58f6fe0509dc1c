// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-side joins over users, subscriptions and videos.
//!
//! The store only offers indexed lookups, so each query is written as a
//! short pipeline of stages: match, join, aggregate, project.

use std::collections::{HashMap, HashSet};

use futures_util::{stream, StreamExt, TryStreamExt};

use crate::db::UserStore;
use crate::error::{AppError, Result};
use crate::models::user::normalize_identity;
use crate::models::{ChannelProfile, Subscription, User, Video, VideoOwner, WatchedVideo};
use crate::Store;

/// Maximum in-flight store reads per query
const MAX_CONCURRENT_READS: usize = 16;

#[derive(Clone)]
pub struct QueryEngine<S: Store> {
    db: S,
}

impl<S: Store> QueryEngine<S> {
    pub fn new(db: S) -> Self {
        Self { db }
    }

    /// Profile of the channel `username` as seen by `viewer_id`.
    pub async fn channel_profile(&self, viewer_id: &str, username: &str) -> Result<ChannelProfile> {
        let username = normalize_identity(username);
        if username.is_empty() {
            return Err(AppError::Validation("Username is missing".to_string()));
        }

        // match
        let matched: Vec<User> = self
            .db
            .find_user_by_username(&username)
            .await?
            .into_iter()
            .collect();

        // join both edge directions
        let mut profiles = Vec::with_capacity(matched.len());
        for channel in matched {
            let (subscribers, subscribed_to) = tokio::try_join!(
                self.db.subscriptions_to_channel(&channel.id),
                self.db.subscriptions_by_subscriber(&channel.id),
            )?;
            profiles.push(project_channel(
                &channel,
                &subscribers,
                &subscribed_to,
                viewer_id,
            ));
        }

        let profile = profiles
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Channel does not exist".to_string()))?;

        tracing::debug!(
            channel = %profile.username,
            subscribers = profile.subscribers_count,
            "Channel profile resolved"
        );

        Ok(profile)
    }

    /// Videos in the user's watch history, in stored order, with owners.
    pub async fn watch_history(&self, user_id: &str) -> Result<Vec<WatchedVideo>> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let video_ids = dedup_preserving_order(&user.watch_history);

        // join videos; `buffered` keeps input order
        let videos: Vec<Video> = stream::iter(video_ids)
            .map(|id| async move { self.db.get_video(&id).await })
            .buffered(MAX_CONCURRENT_READS)
            .try_collect::<Vec<Option<Video>>>()
            .await?
            .into_iter()
            .flatten()
            .collect();

        // sub-join owners, one lookup per distinct owner
        let owner_ids: Vec<String> =
            dedup_preserving_order(videos.iter().map(|v| v.owner.clone()));

        let owners: HashMap<String, VideoOwner> = stream::iter(owner_ids)
            .map(|id| async move {
                let owner = self.db.get_user(&id).await?;
                Ok::<_, AppError>(owner.map(|u| (id, project_owner(&u))))
            })
            .buffer_unordered(MAX_CONCURRENT_READS)
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .flatten()
            .collect();

        let history: Vec<WatchedVideo> = videos
            .into_iter()
            .map(|video| {
                let owner = owners.get(&video.owner).cloned();
                WatchedVideo::from_video(video, owner)
            })
            .collect();

        tracing::debug!(user_id, entries = history.len(), "Watch history resolved");

        Ok(history)
    }
}

fn project_channel(
    channel: &User,
    subscribers: &[Subscription],
    subscribed_to: &[Subscription],
    viewer_id: &str,
) -> ChannelProfile {
    ChannelProfile {
        username: channel.username.clone(),
        full_name: channel.full_name.clone(),
        avatar: channel.avatar.clone(),
        cover_image: channel.cover_image.clone(),
        subscribers_count: subscribers.len(),
        subscribed_to_count: subscribed_to.len(),
        is_subscribed: subscribers.iter().any(|s| s.subscriber == viewer_id),
        email: channel.email.clone(),
    }
}

fn project_owner(user: &User) -> VideoOwner {
    VideoOwner {
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        avatar: user.avatar.clone(),
    }
}

/// First occurrence of each id, in input order.
fn dedup_preserving_order<I, T>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter_map(|id| {
            let id = id.as_ref();
            seen.insert(id.to_string()).then(|| id.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(subscriber: &str, channel: &str) -> Subscription {
        Subscription::new(subscriber, channel)
    }

    #[test]
    fn test_dedup_preserving_order() {
        let ids = vec!["b", "a", "b", "c", "a"];
        assert_eq!(dedup_preserving_order(ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_project_channel_counts_and_viewer() {
        let channel = User {
            id: "c".to_string(),
            username: "chan".to_string(),
            email: "chan@x.com".to_string(),
            full_name: "Channel".to_string(),
            password_hash: "h".to_string(),
            avatar: "a".to_string(),
            cover_image: None,
            refresh_token: Some("secret".to_string()),
            watch_history: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        };
        let subscribers = vec![sub("v1", "c"), sub("v2", "c")];
        let subscribed_to = vec![sub("c", "v1")];

        let seen_by_v2 = project_channel(&channel, &subscribers, &subscribed_to, "v2");
        assert_eq!(seen_by_v2.subscribers_count, 2);
        assert_eq!(seen_by_v2.subscribed_to_count, 1);
        assert!(seen_by_v2.is_subscribed);

        let seen_by_other = project_channel(&channel, &subscribers, &subscribed_to, "v3");
        assert!(!seen_by_other.is_subscribed);
    }
}
