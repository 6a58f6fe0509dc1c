// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VideoTube accounts: user registration, JWT sessions and channel queries.
//!
//! This crate provides the backend API for user accounts: credential
//! verification, access/refresh token rotation, profile updates, and the
//! channel-profile and watch-history read queries.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::UserStore;
use services::{MediaService, QueryEngine, SessionService, TokenIssuer};

/// Bound for a store backend usable as shared application state.
pub trait Store: UserStore + Clone + Send + Sync + 'static {}

impl<T> Store for T where T: UserStore + Clone + Send + Sync + 'static {}

/// Shared application state.
pub struct AppState<S: Store> {
    pub config: Config,
    pub db: S,
    pub sessions: SessionService<S>,
    pub queries: QueryEngine<S>,
}

impl<S: Store> AppState<S> {
    /// Wire the services over one store handle.
    pub fn new(config: Config, db: S, media: MediaService) -> Self {
        let tokens = TokenIssuer::new(&config);
        Self {
            sessions: SessionService::new(db.clone(), tokens, media),
            queries: QueryEngine::new(db.clone()),
            config,
            db,
        }
    }
}
