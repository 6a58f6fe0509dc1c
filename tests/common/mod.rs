// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::path::PathBuf;
use std::sync::Arc;
use videotube_accounts::config::Config;
use videotube_accounts::db::{FirestoreDb, MemoryDb};
use videotube_accounts::models::PublicUser;
use videotube_accounts::routes::create_router;
use videotube_accounts::services::{MediaService, RegisterInput};
use videotube_accounts::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Shared state over a fresh in-memory store with mocked uploads.
#[allow(dead_code)]
pub fn test_state() -> Arc<AppState<MemoryDb>> {
    Arc::new(AppState::new(
        Config::test_default(),
        MemoryDb::new(),
        MediaService::new_mock(),
    ))
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState<MemoryDb>>) {
    let state = test_state();
    (create_router(state.clone()), state)
}

/// Write a small file standing in for an uploaded image.
#[allow(dead_code)]
pub fn staged_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"\x89PNG\r\n\x1a\n").expect("Failed to stage file");
    path
}

/// Register a user with password `p1` and a staged avatar.
#[allow(dead_code)]
pub async fn register_user(
    state: &AppState<MemoryDb>,
    dir: &tempfile::TempDir,
    username: &str,
) -> PublicUser {
    state
        .sessions
        .register(RegisterInput {
            username: username.to_string(),
            email: format!("{}@x.com", username),
            full_name: format!("{} Example", username),
            password: "p1".to_string(),
            avatar: Some(staged_file(dir, &format!("{}.png", username))),
            cover_image: None,
        })
        .await
        .expect("Failed to register test user")
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
