// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides the [`UserStore`] operations over:
//! - Users (profile, password hash, current refresh token)
//! - Usernames / Emails (unique-index reservations)
//! - Subscriptions (channel edges)
//! - Videos (read by watch history)
//!
//! Firestore has no unique indexes, so each user owns one reservation
//! document per unique field. Reservations are created with an
//! `Exists(false)` precondition in the same transaction as the user write.
//! Read-modify-write operations read inside their transaction and write
//! only the fields they change.

use crate::db::{collections, ImageField, SwapOutcome, TokenSlot, UserStore};
use crate::error::AppError;
use crate::models::{Subscription, User, Video};
use crate::time_utils::now_rfc3339;
use firestore::errors::FirestoreError;
use firestore::{
    paths_camel_case, FirestoreConsistencySelector, FirestoreResult, FirestoreTransaction,
    FirestoreWritePrecondition,
};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Attempts per transaction before contention is reported as an error
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// Reservation document for a unique field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniqueKey {
    user_id: String,
}

/// Document ID for a reservation. Emails contain characters Firestore
/// treats specially in paths.
fn key_doc_id(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

// Partial user writes. Each is paired with a field mask naming its fields.

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenUpdate {
    refresh_token: Option<String>,
    updated_at: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordUpdate {
    password_hash: String,
    updated_at: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountUpdate {
    full_name: String,
    email: String,
    updated_at: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover_image: Option<String>,
    updated_at: String,
}

/// Result of an account update transaction.
enum AccountChange {
    Missing,
    EmailTaken,
    Updated(User),
}

/// A commit lost to a concurrent transaction on the same documents.
fn is_contention(err: &FirestoreError) -> bool {
    matches!(err, FirestoreError::DatabaseError(e) if e.public.code == "Aborted")
}

/// A write precondition did not hold at commit.
fn is_precondition_failure(err: &FirestoreError) -> bool {
    match err {
        FirestoreError::DataConflictError(_) => true,
        FirestoreError::DatabaseError(e) => e.public.code == "FailedPrecondition",
        _ => false,
    }
}

async fn rollback(transaction: FirestoreTransaction<'_>) {
    if let Err(e) = transaction.rollback().await {
        tracing::warn!(error = %e, "Transaction rollback failed");
    }
}

/// Run a transaction, retrying while it loses to concurrent transactions.
async fn retry_contended<T, F, Fut>(op: &'static str, mut attempt: F) -> FirestoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FirestoreResult<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if is_contention(&e) && tries < MAX_TRANSACTION_ATTEMPTS => {
                tracing::debug!(op, tries, "Transaction contended, retrying");
                tries += 1;
            }
            result => return result,
        }
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Helper Methods ────────────────────────────────────────────

    async fn get_key(&self, collection: &str, value: &str) -> Result<Option<UniqueKey>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&key_doc_id(value))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// First user whose `field` equals `value`.
    async fn find_user_where(&self, field: &str, value: &str) -> Result<Option<User>, AppError> {
        let field = field.to_string();
        let value = value.to_string();

        let users: Vec<User> = self
            .client
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field(field.as_str()).eq(value.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    async fn subscriptions_where(
        &self,
        field: &str,
        user_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        let field = field.to_string();
        let user_id = user_id.to_string();

        self.client
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| q.for_all([q.field(field.as_str()).eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read a document inside `transaction`, registering it for conflict
    /// detection at commit.
    async fn get_in<T>(
        &self,
        transaction: &FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
    ) -> FirestoreResult<Option<T>>
    where
        T: Send,
        for<'de> T: Deserialize<'de>,
    {
        let client = self
            .client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ));
        client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
    }

    /// Write only the masked fields of an existing user.
    ///
    /// Returns the stored user after the write, or `None` if it does not exist.
    async fn update_user_fields<T>(
        &self,
        user_id: &str,
        fields: Vec<String>,
        update: &T,
    ) -> Result<Option<User>, AppError>
    where
        T: Serialize + for<'de> Deserialize<'de> + Sync + Send,
    {
        let written: FirestoreResult<User> = self
            .client
            .fluent()
            .update()
            .fields(fields)
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(update)
            .execute()
            .await;

        match written {
            Ok(user) => Ok(Some(user)),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(None),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn try_insert_user(&self, user: &User) -> FirestoreResult<()> {
        let key = UniqueKey {
            user_id: user.id.clone(),
        };

        let mut transaction = self.client.begin_transaction().await?;

        for (collection, value) in [
            (collections::USERNAMES, &user.username),
            (collections::EMAILS, &user.email),
        ] {
            self.client
                .fluent()
                .update()
                .in_col(collection)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(key_doc_id(value))
                .object(&key)
                .add_to_transaction(&mut transaction)?;
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(())
    }

    async fn try_swap_refresh_token(
        &self,
        user_id: &str,
        expected: TokenSlot<'_>,
        new_token: Option<&str>,
    ) -> FirestoreResult<SwapOutcome> {
        let mut transaction = self.client.begin_transaction().await?;

        let current: Option<User> = self
            .get_in(&transaction, collections::USERS, user_id)
            .await?;
        let Some(user) = current else {
            rollback(transaction).await;
            return Ok(SwapOutcome::UserMissing);
        };

        if let TokenSlot::Matches(presented) = expected {
            if user.refresh_token.as_deref() != Some(presented) {
                rollback(transaction).await;
                return Ok(SwapOutcome::Stale);
            }
        }

        let update = TokenUpdate {
            refresh_token: new_token.map(str::to_string),
            updated_at: now_rfc3339(),
        };
        self.client
            .fluent()
            .update()
            .fields(paths_camel_case!(User::{refresh_token, updated_at}))
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(&update)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(SwapOutcome::Swapped)
    }

    async fn try_update_account_details(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
    ) -> FirestoreResult<AccountChange> {
        let mut transaction = self.client.begin_transaction().await?;

        let current: Option<User> = self
            .get_in(&transaction, collections::USERS, user_id)
            .await?;
        let Some(mut user) = current else {
            rollback(transaction).await;
            return Ok(AccountChange::Missing);
        };

        let old_email = std::mem::replace(&mut user.email, email.to_string());
        user.full_name = full_name.to_string();
        user.updated_at = now_rfc3339();

        if old_email != user.email {
            let owner: Option<UniqueKey> =
                self.get_in(&transaction, collections::EMAILS, &key_doc_id(email))
                    .await?;
            match owner {
                Some(key) if key.user_id != user_id => {
                    rollback(transaction).await;
                    return Ok(AccountChange::EmailTaken);
                }
                Some(_) => {}
                None => {
                    self.client
                        .fluent()
                        .update()
                        .in_col(collections::EMAILS)
                        .precondition(FirestoreWritePrecondition::Exists(false))
                        .document_id(key_doc_id(email))
                        .object(&UniqueKey {
                            user_id: user_id.to_string(),
                        })
                        .add_to_transaction(&mut transaction)?;
                }
            }

            self.client
                .fluent()
                .delete()
                .from(collections::EMAILS)
                .document_id(key_doc_id(&old_email))
                .add_to_transaction(&mut transaction)?;
        }

        let update = AccountUpdate {
            full_name: full_name.to_string(),
            email: email.to_string(),
            updated_at: user.updated_at.clone(),
        };
        self.client
            .fluent()
            .update()
            .fields(paths_camel_case!(User::{full_name, email, updated_at}))
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(&update)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(AccountChange::Updated(user))
    }
}

impl UserStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        match self.get_key(collections::USERNAMES, username).await? {
            Some(key) => self.get_user(&key.user_id).await,
            None => Ok(None),
        }
    }

    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        if let Some(username) = username {
            if let Some(user) = self.find_user_where("username", username).await? {
                return Ok(Some(user));
            }
        }
        match email {
            Some(email) => self.find_user_where("email", email).await,
            None => Ok(None),
        }
    }

    /// Reserve username and email, then write the user, in one transaction.
    ///
    /// The lookup up front only rejects the common case early; the
    /// reservation preconditions decide races between concurrent inserts.
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let conflict = || AppError::Conflict("User with email or username already exists".into());

        if self.get_key(collections::USERNAMES, &user.username).await?.is_some()
            || self.get_key(collections::EMAILS, &user.email).await?.is_some()
        {
            return Err(conflict());
        }

        match retry_contended("insert_user", move || self.try_insert_user(user)).await {
            Ok(()) => {
                tracing::debug!(user_id = %user.id, "User and unique keys written");
                Ok(())
            }
            Err(e) if is_precondition_failure(&e) => {
                tracing::debug!(user_id = %user.id, error = %e, "Unique key already reserved");
                Err(conflict())
            }
            Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e))),
        }
    }

    /// Compare-and-swap of the refresh token.
    ///
    /// The stored token is read inside the transaction, so a concurrent
    /// write to the user aborts the commit. The swap is then retried and
    /// re-compared against the fresh value.
    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: TokenSlot<'_>,
        new_token: Option<&str>,
    ) -> Result<SwapOutcome, AppError> {
        retry_contended("swap_refresh_token", move || {
            self.try_swap_refresh_token(user_id, expected, new_token)
        })
        .await
        .map_err(|e| AppError::Database(format!("Refresh token swap failed: {}", e)))
    }

    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let update = PasswordUpdate {
            password_hash: password_hash.to_string(),
            updated_at: now_rfc3339(),
        };
        let written = self
            .update_user_fields(
                user_id,
                paths_camel_case!(User::{password_hash, updated_at}),
                &update,
            )
            .await?;
        Ok(written.is_some())
    }

    async fn update_account_details(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let email_taken = || AppError::Conflict("Email is already in use".into());

        let change = retry_contended("update_account_details", move || {
            self.try_update_account_details(user_id, full_name, email)
        })
        .await;

        match change {
            Ok(AccountChange::Updated(user)) => Ok(Some(user)),
            Ok(AccountChange::Missing) => Ok(None),
            Ok(AccountChange::EmailTaken) => Err(email_taken()),
            Err(e) if is_precondition_failure(&e) => Err(email_taken()),
            Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e))),
        }
    }

    async fn set_image(
        &self,
        user_id: &str,
        field: ImageField,
        url: &str,
    ) -> Result<Option<User>, AppError> {
        let updated_at = now_rfc3339();
        match field {
            ImageField::Avatar => {
                let update = ImageUpdate {
                    avatar: Some(url.to_string()),
                    cover_image: None,
                    updated_at,
                };
                self.update_user_fields(
                    user_id,
                    paths_camel_case!(User::{avatar, updated_at}),
                    &update,
                )
                .await
            }
            ImageField::CoverImage => {
                let update = ImageUpdate {
                    avatar: None,
                    cover_image: Some(url.to_string()),
                    updated_at,
                };
                self.update_user_fields(
                    user_id,
                    paths_camel_case!(User::{cover_image, updated_at}),
                    &update,
                )
                .await
            }
        }
    }

    // ─── Subscription Operations ─────────────────────────────────

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&subscription.id)
            .object(subscription)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn subscriptions_to_channel(
        &self,
        channel_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        self.subscriptions_where("channel", channel_id).await
    }

    async fn subscriptions_by_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        self.subscriptions_where("subscriber", subscriber_id).await
    }

    // ─── Video Operations ────────────────────────────────────────

    async fn get_video(&self, id: &str) -> Result<Option<Video>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::VIDEOS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_video(&self, video: &Video) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::VIDEOS)
            .document_id(&video.id)
            .object(video)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
