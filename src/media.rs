//! Blob storage client for audio recordings and camera captures.
//!
//! Uploads stream the file with integer percent progress: monotonically
//! non-decreasing, capped at 99 while bytes are in flight, exactly one 100
//! on success, and 0 on any failure so observers never see progress stuck
//! mid-upload.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use futures::stream;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::models::BlobItem;

const UPLOAD_CHUNK: usize = 64 * 1024;

/// Logical folders in blob storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Audio,
    Images,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Audio => "audio",
            MediaFolder::Images => "images",
        }
    }
}

impl FromStr for MediaFolder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(MediaFolder::Audio),
            "images" => Ok(MediaFolder::Images),
            other => Err(format!(
                "Unknown media folder '{}' (expected 'audio' or 'images')",
                other
            )),
        }
    }
}

impl std::fmt::Display for MediaFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from blob storage operations.
#[derive(Debug)]
pub enum MediaError {
    /// Local file could not be read.
    Io(std::io::Error),
    /// The transfer failed.
    Http(reqwest::Error),
    /// The storage service answered with a non-success status.
    UnexpectedStatus(reqwest::StatusCode),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::Io(e) => write!(f, "File error: {}", e),
            MediaError::Http(e) => write!(f, "Transfer error: {}", e),
            MediaError::UnexpectedStatus(status) => {
                write!(f, "Storage service returned {}", status)
            }
        }
    }
}

impl std::error::Error for MediaError {}

impl From<std::io::Error> for MediaError {
    fn from(e: std::io::Error) -> Self {
        MediaError::Io(e)
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        MediaError::Http(e)
    }
}

/// Response body of a successful upload.
#[derive(serde::Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the hub's blob storage routes.
#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    base_url: String,
}

impl MediaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn blob_url(&self, folder: MediaFolder, name: &str) -> String {
        format!(
            "{}/blobs/{}/{}",
            self.base_url,
            folder,
            urlencoding::encode(name)
        )
    }

    /// Uploads a local file, reporting percent progress through the
    /// callback. Returns the retrievable address on success.
    pub async fn upload_with_progress<F>(
        &self,
        folder: MediaFolder,
        name: &str,
        path: &Path,
        on_progress: F,
    ) -> Result<String, MediaError>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let on_progress: Arc<dyn Fn(u8) + Send + Sync> = Arc::new(on_progress);
        let result = self
            .upload_inner(folder, name, path, Arc::clone(&on_progress))
            .await;

        match result {
            Ok(url) => {
                on_progress(100);
                Ok(url)
            }
            Err(e) => {
                on_progress(0);
                Err(e)
            }
        }
    }

    async fn upload_inner(
        &self,
        folder: MediaFolder,
        name: &str,
        path: &Path,
        on_progress: Arc<dyn Fn(u8) + Send + Sync>,
    ) -> Result<String, MediaError> {
        let total = tokio::fs::metadata(path).await?.len();
        let file = tokio::fs::File::open(path).await?;

        struct UploadState {
            file: tokio::fs::File,
            sent: u64,
            total: u64,
            last_percent: u8,
            failed: bool,
            on_progress: Arc<dyn Fn(u8) + Send + Sync>,
        }

        let body_stream = stream::unfold(
            UploadState {
                file,
                sent: 0,
                total,
                last_percent: 0,
                failed: false,
                on_progress,
            },
            |mut state| async move {
                if state.failed {
                    return None;
                }
                let mut chunk = vec![0u8; UPLOAD_CHUNK];
                match state.file.read(&mut chunk).await {
                    Ok(0) => None,
                    Ok(n) => {
                        chunk.truncate(n);
                        state.sent += n as u64;
                        // Cap at 99 while streaming; 100 is reported once,
                        // after the service confirms the upload.
                        let percent =
                            ((state.sent * 100 / state.total.max(1)) as u8).min(99);
                        if percent > state.last_percent {
                            state.last_percent = percent;
                            (state.on_progress)(percent);
                        }
                        Some((Ok::<_, std::io::Error>(chunk), state))
                    }
                    Err(e) => {
                        state.failed = true;
                        Some((Err(e), state))
                    }
                }
            },
        );

        let response = self
            .http
            .put(self.blob_url(folder, name))
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::UnexpectedStatus(response.status()));
        }

        let uploaded: UploadResponse = response.json().await?;
        Ok(self.absolutize(uploaded.url))
    }

    /// Lists a folder, newest first.
    pub async fn list(&self, folder: MediaFolder) -> Result<Vec<BlobItem>, MediaError> {
        let response = self
            .http
            .get(format!("{}/blobs/{}", self.base_url, folder))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::UnexpectedStatus(response.status()));
        }

        let mut items: Vec<BlobItem> = response.json().await?;
        for item in &mut items {
            item.url = self.absolutize(std::mem::take(&mut item.url));
        }
        Ok(items)
    }

    /// Deletes a file. Deleting an absent file succeeds.
    pub async fn delete(&self, folder: MediaFolder, name: &str) -> Result<(), MediaError> {
        let response = self
            .http
            .delete(self.blob_url(folder, name))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::UnexpectedStatus(response.status()));
        }
        Ok(())
    }

    fn absolutize(&self, url: String) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            url
        }
    }
}

/// Builds a collision-free file name: `<stem>_<epoch-ms>_<uuid8>.<ext>`.
pub fn unique_file_name(stem: &str, extension: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let uuid = Uuid::new_v4().to_string();
    format!("{}_{}_{}.{}", stem, timestamp, &uuid[..8], extension)
}
