// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Channel profile and watch history query tests.

use videotube_accounts::db::{MemoryDb, UserStore};
use videotube_accounts::error::AppError;
use videotube_accounts::models::{Subscription, User, Video};
use videotube_accounts::AppState;

mod common;
use common::{register_user, test_state};

fn video(id: &str, owner: &str) -> Video {
    Video {
        id: id.to_string(),
        video_file: format!("https://cdn/{}.mp4", id),
        thumbnail: format!("https://cdn/{}.jpg", id),
        title: format!("Video {}", id),
        description: String::new(),
        duration: 12.5,
        views: 3,
        is_published: true,
        owner: owner.to_string(),
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        updated_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

async fn subscribe(state: &AppState<MemoryDb>, subscriber: &str, channel: &str) {
    state
        .db
        .insert_subscription(&Subscription::new(subscriber, channel))
        .await
        .unwrap();
}

/// Insert a viewer whose watch history was recorded elsewhere.
async fn insert_viewer(state: &AppState<MemoryDb>, ids: &[&str]) -> User {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: "viewer".to_string(),
        email: "viewer@x.com".to_string(),
        full_name: "Viewer".to_string(),
        password_hash: "$argon2id$unused".to_string(),
        avatar: "https://cdn/viewer.png".to_string(),
        cover_image: None,
        refresh_token: None,
        watch_history: ids.iter().map(|id| id.to_string()).collect(),
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        updated_at: "2026-01-01T00:00:00.000Z".to_string(),
    };
    state.db.insert_user(&user).await.unwrap();
    user
}

// ═══════════════════════════════════════════════════════════════════════════
// CHANNEL PROFILE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_channel_profile_counts_edges() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let channel = register_user(&state, &dir, "chan").await;
    let v1 = register_user(&state, &dir, "viewer1").await;
    let v2 = register_user(&state, &dir, "viewer2").await;
    let v3 = register_user(&state, &dir, "viewer3").await;

    // N = 2 subscribers, M = 1 subscription
    subscribe(&state, &v1.id, &channel.id).await;
    subscribe(&state, &v2.id, &channel.id).await;
    subscribe(&state, &channel.id, &v3.id).await;

    let profile = state
        .queries
        .channel_profile(&v1.id, "Chan")
        .await
        .unwrap();
    assert_eq!(profile.username, "chan");
    assert_eq!(profile.subscribers_count, 2);
    assert_eq!(profile.subscribed_to_count, 1);
    assert!(profile.is_subscribed);

    let profile = state
        .queries
        .channel_profile(&v3.id, "chan")
        .await
        .unwrap();
    assert!(!profile.is_subscribed);
}

#[tokio::test]
async fn test_channel_profile_projection() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let channel = register_user(&state, &dir, "chan").await;

    let profile = state
        .queries
        .channel_profile(&channel.id, "chan")
        .await
        .unwrap();

    let json = serde_json::to_value(&profile).unwrap();
    let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "avatar",
            "coverImage",
            "email",
            "fullName",
            "isSubscribed",
            "subscribedToCount",
            "subscribersCount",
            "username"
        ]
    );
    assert_eq!(json["subscribersCount"], 0);
}

#[tokio::test]
async fn test_channel_profile_missing_or_blank() {
    let state = test_state();

    let err = state
        .queries
        .channel_profile("viewer", "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state
        .queries
        .channel_profile("viewer", "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// WATCH HISTORY
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_watch_history_preserves_order_with_owner() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let creator = register_user(&state, &dir, "creator").await;

    for id in ["v1", "v2", "v3"] {
        state.db.upsert_video(&video(id, &creator.id)).await.unwrap();
    }
    let viewer = insert_viewer(&state, &["v3", "v1", "v2"]).await;

    let history = state.queries.watch_history(&viewer.id).await.unwrap();
    let ids: Vec<&str> = history.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v3", "v1", "v2"]);

    let owner = history[0].owner.as_ref().unwrap();
    assert_eq!(owner.username, "creator");
    assert_eq!(owner.full_name, "creator Example");

    let json = serde_json::to_value(&history[0]).unwrap();
    let owner_json = json["owner"].as_object().unwrap();
    assert_eq!(owner_json.len(), 3);
    assert!(owner_json.contains_key("avatar"));
}

#[tokio::test]
async fn test_watch_history_skips_dangling_and_duplicate_entries() {
    let state = test_state();

    state.db.upsert_video(&video("v1", "deleted-user")).await.unwrap();
    let viewer = insert_viewer(&state, &["v1", "gone", "v1"]).await;

    let history = state.queries.watch_history(&viewer.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].owner.is_none());
}

#[tokio::test]
async fn test_watch_history_unknown_user() {
    let state = test_state();
    let err = state.queries.watch_history("nobody").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
