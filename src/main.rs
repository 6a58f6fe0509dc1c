// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VideoTube Accounts API Server
//!
//! User registration, JWT sessions with refresh-token rotation, and the
//! channel-profile and watch-history queries.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use videotube_accounts::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryDb},
    services::MediaService,
    AppState, Store,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting VideoTube Accounts API");

    let media = media_service(&config);
    let backend = config.store_backend;

    match backend {
        StoreBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore");
            tracing::info!(project = %config.gcp_project_id, "Firestore store initialized");
            serve(config, db, media).await
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            serve(config, MemoryDb::new(), media).await
        }
    }
}

fn media_service(config: &Config) -> MediaService {
    if let Some(cloudinary) = config.cloudinary.clone() {
        tracing::info!(cloud = %cloudinary.cloud_name, "Media uploads via Cloudinary");
        return MediaService::new(cloudinary);
    }

    unconfigured_media()
}

#[cfg(debug_assertions)]
fn unconfigured_media() -> MediaService {
    tracing::warn!("Cloudinary not configured; media uploads are mocked");
    MediaService::new_mock()
}

#[cfg(not(debug_assertions))]
fn unconfigured_media() -> MediaService {
    panic!("Cloudinary credentials are required in release builds");
}

async fn serve<S: Store>(
    config: Config,
    db: S,
    media: MediaService,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    // Build shared state
    let state = Arc::new(AppState::new(config, db, media));

    // Build router
    let app = videotube_accounts::routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("videotube_accounts=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
