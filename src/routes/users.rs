// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account routes under `/api/v1/users`.

use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::models::{ChannelProfile, PublicUser, WatchedVideo};
use crate::response::ApiResponse;
use crate::services::{
    ChangePasswordInput, LoginInput, RegisterInput, SessionTokens, UpdateAccountInput,
};
use crate::{AppState, Store};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Routes that do not require a session.
pub fn public_routes<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/register", post(register::<S>))
        .route("/login", post(login::<S>))
        .route("/refresh-token", post(refresh_token::<S>))
}

/// Routes behind `require_auth`. The layer is applied in routes/mod.rs.
pub fn protected_routes<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/logout", post(logout::<S>))
        .route("/change-password", post(change_password::<S>))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account::<S>))
        .route("/avatar", patch(update_avatar::<S>))
        .route("/cover-image", patch(update_cover_image::<S>))
        .route("/channel-profile/{username}", get(channel_profile::<S>))
        .route("/watch-history", get(watch_history::<S>))
}

/// Unwrap a JSON body, reporting parse failures in the error envelope.
fn body<T: DeserializeOwned>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::Validation(e.body_text()))
}

// ─── Session Cookies ─────────────────────────────────────────

fn session_cookie(
    name: &'static str,
    value: String,
    ttl_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs))
        .build()
}

fn with_session_cookies<S: Store>(
    jar: CookieJar,
    state: &AppState<S>,
    tokens: &SessionTokens,
) -> CookieJar {
    let issuer = state.sessions.tokens();
    let secure = state.config.secure_cookies;
    jar.add(session_cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        issuer.access_ttl_secs(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        issuer.refresh_ttl_secs(),
        secure,
    ))
}

/// Removal cookies carry the same attributes the session cookies were set with.
fn without_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.remove(session_cookie(ACCESS_COOKIE, String::new(), 0, secure))
        .remove(session_cookie(REFRESH_COOKIE, String::new(), 0, secure))
}

// ─── Registration / Login ────────────────────────────────────

/// Registration body. Image paths name files already staged on local disk.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar_path: Option<PathBuf>,
    pub cover_image_path: Option<PathBuf>,
}

async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let req = body(payload)?;
    let user = state
        .sessions
        .register(RegisterInput {
            username: req.username,
            email: req.email,
            full_name: req.full_name,
            password: req.password,
            avatar: req.avatar_path,
            cover_image: req.cover_image_path,
        })
        .await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "User registered successfully",
        user,
    ))
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>)> {
    let req = body(payload)?;
    let session = state
        .sessions
        .login(LoginInput {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    let jar = with_session_cookies(jar, &state, &session.tokens);

    Ok((
        jar,
        ApiResponse::ok(
            "User logged in successfully",
            LoginResponse {
                user: session.user,
                access_token: session.tokens.access_token,
                refresh_token: session.tokens.refresh_token,
            },
        ),
    ))
}

// ─── Rotation / Logout ───────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Exchange a refresh token (cookie first, then body) for a new pair.
async fn refresh_token<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SessionTokens>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| payload.ok().and_then(|Json(req)| req.refresh_token));

    let session = state.sessions.refresh(presented.as_deref()).await?;
    let jar = with_session_cookies(jar, &state, &session.tokens);

    Ok((jar, ApiResponse::ok("Access token refreshed", session.tokens)))
}

async fn logout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>)> {
    state.sessions.logout(auth.id()).await?;

    Ok((
        without_session_cookies(jar, state.config.secure_cookies),
        ApiResponse::ok("User logged out", serde_json::json!({})),
    ))
}

// ─── Account ─────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

async fn change_password<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<serde_json::Value>> {
    let req = body(payload)?;
    state
        .sessions
        .change_password(
            auth.id(),
            ChangePasswordInput {
                old_password: req.old_password,
                new_password: req.new_password,
            },
        )
        .await?;

    Ok(ApiResponse::ok(
        "Password changed successfully",
        serde_json::json!({}),
    ))
}

async fn current_user(Extension(auth): Extension<AuthUser>) -> ApiResponse<PublicUser> {
    ApiResponse::ok("Current user fetched successfully", auth.user)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub full_name: String,
    pub email: String,
}

async fn update_account<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let req = body(payload)?;
    let user = state
        .sessions
        .update_account(
            auth.id(),
            UpdateAccountInput {
                full_name: req.full_name,
                email: req.email,
            },
        )
        .await?;

    Ok(ApiResponse::ok("Account details updated successfully", user))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRequest {
    pub avatar_path: Option<PathBuf>,
    pub cover_image_path: Option<PathBuf>,
}

async fn update_avatar<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<ImageRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let req = body(payload)?;
    let user = state
        .sessions
        .update_avatar(auth.id(), req.avatar_path)
        .await?;

    Ok(ApiResponse::ok("Avatar updated successfully", user))
}

async fn update_cover_image<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<ImageRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let req = body(payload)?;
    let user = state
        .sessions
        .update_cover_image(auth.id(), req.cover_image_path)
        .await?;

    Ok(ApiResponse::ok("Cover image updated successfully", user))
}

// ─── Queries ─────────────────────────────────────────────────

async fn channel_profile<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>> {
    let profile = state
        .queries
        .channel_profile(auth.id(), &username)
        .await?;

    Ok(ApiResponse::ok("User channel fetched successfully", profile))
}

async fn watch_history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<WatchedVideo>>> {
    let history = state.queries.watch_history(auth.id()).await?;

    Ok(ApiResponse::ok("Watch history fetched successfully", history))
}
