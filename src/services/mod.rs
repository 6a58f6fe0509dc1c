// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod media;
pub mod password;
pub mod queries;
pub mod session;
pub mod tokens;

pub use media::{MediaService, UploadedMedia};
pub use queries::QueryEngine;
pub use session::{
    AuthSession, ChangePasswordInput, LoginInput, RegisterInput, SessionService,
    UpdateAccountInput,
};
pub use tokens::{SessionTokens, TokenError, TokenIssuer};
