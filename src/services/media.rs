// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Object store for avatar and cover images (Cloudinary upload API).
//!
//! Files arrive already staged on local disk; this service uploads one and
//! returns its public URL. The staged file is removed after the attempt,
//! whatever the outcome.

use crate::config::CloudinaryConfig;
use crate::error::AppError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    pub url: String,
}

#[derive(Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

#[derive(Clone)]
struct CloudinaryClient {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

/// Media upload service.
#[derive(Clone)]
pub struct MediaService {
    client: Option<CloudinaryClient>,
}

impl MediaService {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Some(CloudinaryClient {
                http: reqwest::Client::new(),
                config,
            }),
        }
    }

    /// Create a mock media service for testing (offline mode).
    /// Only available in debug/test builds.
    ///
    /// Existing files "upload" to a deterministic URL and are left in place;
    /// missing files fail like a rejected upload.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Upload a staged local file and return its URL.
    pub async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, AppError> {
        // Mock mode (Debug builds only)
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return mock_upload(local_path).await;
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Upload("Media storage not configured".to_string()))?;

        let result = client.upload(local_path).await;

        if let Err(e) = tokio::fs::remove_file(local_path).await {
            tracing::warn!(path = %local_path.display(), error = %e, "Failed to remove staged upload");
        }

        match &result {
            Ok(media) => tracing::info!(url = %media.url, "Media uploaded"),
            Err(e) => tracing::warn!(path = %local_path.display(), error = %e, "Media upload failed"),
        }

        result
    }
}

impl CloudinaryClient {
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, AppError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| AppError::Upload(format!("Cannot read staged file: {}", e)))?;

        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(&timestamp, &self.config.api_secret);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            self.config.cloud_name
        );

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upload(format!(
                "Upload rejected ({}): {}",
                status, body
            )));
        }

        let body: CloudinaryUploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upload(format!("Unexpected upload response: {}", e)))?;

        Ok(UploadedMedia {
            url: body.secure_url,
        })
    }
}

/// Signature over the sorted signed parameters followed by the API secret.
fn sign_params(timestamp: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("timestamp={}{}", timestamp, api_secret).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(debug_assertions)]
async fn mock_upload(local_path: &Path) -> Result<UploadedMedia, AppError> {
    match tokio::fs::metadata(local_path).await {
        Ok(meta) if meta.is_file() => {
            let name = local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(UploadedMedia {
                url: format!("https://media.invalid/mock/{}", urlencoding::encode(&name)),
            })
        }
        _ => Err(AppError::Upload(format!(
            "Staged file not found: {}",
            local_path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_params_is_hex_sha256() {
        let sig = sign_params("1700000000", "secret");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, sign_params("1700000000", "secret"));
        assert_ne!(sig, sign_params("1700000001", "secret"));
    }

    #[tokio::test]
    async fn test_mock_upload_requires_existing_file() {
        let media = MediaService::new_mock();

        let staged = tempfile::NamedTempFile::new().unwrap();
        let uploaded = media.upload(staged.path()).await.unwrap();
        assert!(uploaded.url.starts_with("https://media.invalid/mock/"));

        let err = media
            .upload(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
    }
}
