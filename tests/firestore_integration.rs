// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Start the emulator and set FIRESTORE_EMULATOR_HOST to run them.
//!
//! Every test uses fresh random identities, so runs do not interfere.

use videotube_accounts::db::{ImageField, SwapOutcome, TokenSlot, UserStore};
use videotube_accounts::error::AppError;
use videotube_accounts::models::{Subscription, User, Video};

mod common;
use common::test_db;

/// Generate a unique suffix for test isolation.
fn unique() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Helper to create a basic test user
fn test_user(tag: &str) -> User {
    let now = chrono::Utc::now().to_rfc3339();
    User {
        id: uuid::Uuid::new_v4().to_string(),
        username: format!("user{}", tag),
        email: format!("user{}@example.com", tag),
        full_name: "Test User".to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        avatar: "https://cdn/avatar.png".to_string(),
        cover_image: None,
        refresh_token: None,
        watch_history: vec![],
        created_at: now.clone(),
        updated_at: now,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_insert_and_lookup_user() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());

    db.insert_user(&user).await.expect("Failed to insert user");

    let by_id = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, user.username);

    let by_username = db.find_user_by_username(&user.username).await.unwrap();
    assert_eq!(by_username.map(|u| u.id), Some(user.id.clone()));

    let by_email = db
        .find_user_by_login(None, Some(&user.email))
        .await
        .unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn test_duplicate_identity_conflicts() {
    require_emulator!();
    let db = test_db().await;
    let tag = unique();
    let first = test_user(&tag);
    db.insert_user(&first).await.unwrap();

    let mut same_email = test_user(&unique());
    same_email.email = first.email.clone();
    let err = db.insert_user(&same_email).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The failed insert must not leave its username reserved
    let mut retry = test_user(&unique());
    retry.username = same_email.username.clone();
    db.insert_user(&retry).await.expect("username should be free");
}

#[tokio::test]
async fn test_swap_refresh_token() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();

    let outcome = db
        .swap_refresh_token(&user.id, TokenSlot::Any, Some("rt1"))
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped);

    let outcome = db
        .swap_refresh_token(&user.id, TokenSlot::Matches("stale"), Some("rt2"))
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::Stale);

    let outcome = db
        .swap_refresh_token(&user.id, TokenSlot::Matches("rt1"), Some("rt2"))
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped);

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("rt2"));

    let outcome = db
        .swap_refresh_token("missing-user", TokenSlot::Any, None)
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::UserMissing);
}

#[tokio::test]
async fn test_update_account_and_images() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    let other = test_user(&unique());
    db.insert_user(&user).await.unwrap();
    db.insert_user(&other).await.unwrap();

    let err = db
        .update_account_details(&user.id, "New Name", &other.email)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let new_email = format!("moved{}@example.com", unique());
    let updated = db
        .update_account_details(&user.id, "New Name", &new_email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.email, new_email);
    assert_eq!(updated.full_name, "New Name");

    let updated = db
        .set_image(&user.id, ImageField::CoverImage, "https://cdn/cover.png")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.cover_image.as_deref(), Some("https://cdn/cover.png"));

    assert!(db.set_password_hash(&user.id, "$argon2id$new").await.unwrap());
    assert!(!db.set_password_hash("missing-user", "x").await.unwrap());
}

// ═══════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION / VIDEO TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_subscription_edges() {
    require_emulator!();
    let db = test_db().await;
    let channel = format!("channel-{}", unique());
    let fan = format!("fan-{}", unique());

    db.insert_subscription(&Subscription::new(&fan, &channel))
        .await
        .unwrap();

    let to_channel = db.subscriptions_to_channel(&channel).await.unwrap();
    assert_eq!(to_channel.len(), 1);
    assert_eq!(to_channel[0].subscriber, fan);

    let by_fan = db.subscriptions_by_subscriber(&fan).await.unwrap();
    assert_eq!(by_fan.len(), 1);
    assert!(db.subscriptions_by_subscriber(&channel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_video_roundtrip() {
    require_emulator!();
    let db = test_db().await;
    let now = chrono::Utc::now().to_rfc3339();
    let video = Video {
        id: format!("video-{}", unique()),
        video_file: "https://cdn/v.mp4".to_string(),
        thumbnail: "https://cdn/v.jpg".to_string(),
        title: "Title".to_string(),
        description: "Description".to_string(),
        duration: 61.0,
        views: 0,
        is_published: true,
        owner: "owner-id".to_string(),
        created_at: now.clone(),
        updated_at: now,
    };

    db.upsert_video(&video).await.unwrap();
    assert_eq!(db.get_video(&video.id).await.unwrap(), Some(video));
}

// ═══════════════════════════════════════════════════════════════════════════
// CONCURRENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════

const NUM_CONCURRENT_REQUESTS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_insert_same_username() {
    require_emulator!();
    let db = test_db().await;
    let username = format!("racer{}", unique());

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_REQUESTS {
        let db = db.clone();
        let mut user = test_user(&unique());
        user.username = username.clone();
        handles.push(tokio::spawn(async move { db.insert_user(&user).await }));
    }

    let mut inserted = 0;
    for handle in handles {
        match handle.await.expect("Task join failed") {
            Ok(()) => inserted += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(inserted, 1, "exactly one insert may claim the username");
    assert!(db.find_user_by_username(&username).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_swap_with_same_token() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();
    db.swap_refresh_token(&user.id, TokenSlot::Any, Some("R1"))
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..NUM_CONCURRENT_REQUESTS {
        let db = db.clone();
        let user_id = user.id.clone();
        handles.push(tokio::spawn(async move {
            let token = format!("R2-{i}");
            let outcome = db
                .swap_refresh_token(&user_id, TokenSlot::Matches("R1"), Some(&token))
                .await;
            (token, outcome)
        }));
    }

    let mut winners = vec![];
    for handle in handles {
        let (token, outcome) = handle.await.expect("Task join failed");
        match outcome.unwrap() {
            SwapOutcome::Swapped => winners.push(token),
            SwapOutcome::Stale => {}
            SwapOutcome::UserMissing => panic!("user vanished"),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one rotation may win");
    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token, Some(winners[0].clone()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_field_updates_do_not_restore_rotated_token() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();

    for round in 0..20 {
        let old = format!("old-{round}");
        let new = format!("new-{round}");
        let avatar = format!("https://cdn/avatar-{round}.png");
        let hash = format!("hash-{round}");
        db.swap_refresh_token(&user.id, TokenSlot::Any, Some(&old))
            .await
            .unwrap();

        let swap = {
            let db = db.clone();
            let user_id = user.id.clone();
            let (old, new) = (old.clone(), new.clone());
            tokio::spawn(async move {
                db.swap_refresh_token(&user_id, TokenSlot::Matches(&old), Some(&new))
                    .await
            })
        };
        let image = {
            let db = db.clone();
            let user_id = user.id.clone();
            let avatar = avatar.clone();
            tokio::spawn(async move {
                db.set_image(&user_id, ImageField::Avatar, &avatar).await
            })
        };
        let password = {
            let db = db.clone();
            let user_id = user.id.clone();
            let hash = hash.clone();
            tokio::spawn(async move { db.set_password_hash(&user_id, &hash).await })
        };

        let swapped = swap.await.unwrap().unwrap();
        assert!(image.await.unwrap().unwrap().is_some());
        assert!(password.await.unwrap().unwrap());
        assert_eq!(swapped, SwapOutcome::Swapped, "round {round}");

        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, Some(new), "round {round}");
        assert_eq!(stored.avatar, avatar, "round {round}");
        assert_eq!(stored.password_hash, hash, "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_email_changes_release_losing_address() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();

    let emails = [
        format!("a{}@example.com", unique()),
        format!("b{}@example.com", unique()),
    ];
    let handles: Vec<_> = emails
        .iter()
        .cloned()
        .map(|email| {
            let db = db.clone();
            let user_id = user.id.clone();
            tokio::spawn(async move {
                db.update_account_details(&user_id, "Test User", &email)
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    let current = db.get_user(&user.id).await.unwrap().unwrap().email;
    assert!(emails.contains(&current));

    // The address the user ended up with stays reserved; the other is free
    let mut taker = test_user(&unique());
    taker.email = current.clone();
    assert!(matches!(
        db.insert_user(&taker).await.unwrap_err(),
        AppError::Conflict(_)
    ));

    let released = emails.iter().find(|e| **e != current).unwrap();
    let mut taker = test_user(&unique());
    taker.email = released.clone();
    db.insert_user(&taker).await.unwrap();
}
