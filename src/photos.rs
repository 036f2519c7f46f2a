//! Google Photos Library API client
//!
//! Uploading is a two-step protocol: push the raw bytes to `/v1/uploads`
//! to obtain an upload token, then attach that token to a media item
//! via `mediaItems:batchCreate`. Both steps together count as one
//! attempt for the retry policy.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header;
use serde::Deserialize;

use crate::retry::Backoff;

const DEFAULT_BASE: &str = "https://photoslibrary.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum PhotosError {
    #[error("photos API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("photos API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("batchCreate returned no media item: {0}")]
    MissingItem(String),
}

pub struct PhotosClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    backoff: Backoff,
}

impl PhotosClient {
    pub fn new(access_token: String) -> Result<Self, PhotosError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE.to_string(),
            access_token,
            backoff: Backoff::default(),
        })
    }

    /// Point the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Push raw image bytes and return the upload token. The token is
    /// the response body verbatim.
    pub async fn upload_bytes(&self, bytes: &[u8]) -> Result<String, PhotosError> {
        let response = self
            .http
            .post(format!("{}/v1/uploads", self.base_url))
            .bearer_auth(&self.access_token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header("X-Goog-Upload-Content-Type", "image/png")
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes.to_vec())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.text().await?)
    }

    /// Turn an upload token into a library item and return its id.
    pub async fn create_item(
        &self,
        upload_token: &str,
        file_name: &str,
        description: &str,
    ) -> Result<String, PhotosError> {
        let body = serde_json::json!({
            "newMediaItems": [{
                "description": description,
                "simpleMediaItem": {
                    "fileName": file_name,
                    "uploadToken": upload_token,
                }
            }]
        });
        let response = self
            .http
            .post(format!("{}/v1/mediaItems:batchCreate", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed: BatchCreateResponse = response.json().await?;
        match parsed.new_media_item_results.into_iter().next() {
            Some(result) => match result.media_item {
                Some(item) => Ok(item.id),
                None => Err(PhotosError::MissingItem(
                    result
                        .status
                        .and_then(|s| s.message)
                        .unwrap_or_else(|| "no status message".to_string()),
                )),
            },
            None => Err(PhotosError::MissingItem("empty result list".to_string())),
        }
    }

    /// Upload one image file with a description, retrying the whole
    /// two-step protocol on failure.
    pub async fn upload_image(&self, path: &Path, description: &str) -> Result<String> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.png");
        let id = self
            .backoff
            .run("photo upload", || {
                self.attempt(&bytes, file_name, description)
            })
            .await
            .with_context(|| format!("failed to upload {}", path.display()))?;
        log::info!("uploaded {} as media item {}", path.display(), id);
        Ok(id)
    }

    async fn attempt(
        &self,
        bytes: &[u8],
        file_name: &str,
        description: &str,
    ) -> Result<String, PhotosError> {
        let token = self.upload_bytes(bytes).await?;
        self.create_item(&token, file_name, description).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PhotosError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PhotosError::Status {
        status,
        body: body.trim().to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<MediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItemResult {
    #[serde(default)]
    media_item: Option<MediaItem>,
    #[serde(default)]
    status: Option<ItemStatus>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    message: Option<String>,
}
