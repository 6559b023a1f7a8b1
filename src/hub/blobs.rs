//! Blob storage routes: uploads, listings, downloads, deletes.
//!
//! Files live under `<data_dir>/blobs/<folder>/`. Only the known logical
//! folders ("audio", "images") exist; file names must be plain names, not
//! paths.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::media::MediaFolder;
use crate::models::BlobItem;

use super::HubState;

/// Resolves and validates the folder segment.
fn parse_folder(folder: &str) -> Result<MediaFolder, Response> {
    folder
        .parse()
        .map_err(|_| StatusCode::NOT_FOUND.into_response())
}

/// File names must not traverse the folder.
fn valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

fn blob_path(state: &HubState, folder: MediaFolder, name: &str) -> std::path::PathBuf {
    state.blob_dir(folder.as_str()).join(name)
}

pub async fn put_blob(
    State(state): State<HubState>,
    Path((folder, name)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let folder = match parse_folder(&folder) {
        Ok(folder) => folder,
        Err(response) => return response,
    };
    if !valid_name(&name) {
        return (StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }

    let dir = state.blob_dir(folder.as_str());
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        tracing::error!("Failed to create blob dir {}: {}", dir.display(), e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let path = blob_path(&state, folder, &name);
    if let Err(e) = tokio::fs::write(&path, &body).await {
        tracing::error!("Failed to store blob {}: {}", path.display(), e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    tracing::info!("Stored {}/{} ({} bytes)", folder, name, body.len());
    let url = format!("/blobs/{}/{}", folder, urlencoding::encode(&name));
    Json(json!({ "url": url })).into_response()
}

pub async fn list_blobs(State(state): State<HubState>, Path(folder): Path<String>) -> Response {
    let folder = match parse_folder(&folder) {
        Ok(folder) => folder,
        Err(response) => return response,
    };

    let dir = state.blob_dir(folder.as_str());
    let mut items: Vec<BlobItem> = Vec::new();

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        // Nothing uploaded yet.
        Err(_) => return Json(items).into_response(),
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable blob {}: {}", name, e);
                        continue;
                    }
                };
                if !metadata.is_file() {
                    continue;
                }
                let created_ms = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                items.push(BlobItem {
                    url: format!("/blobs/{}/{}", folder, urlencoding::encode(&name)),
                    name,
                    created_ms,
                    size: metadata.len(),
                });
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed listing {}: {}", dir.display(), e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    // Newest first.
    items.sort_by(|a, b| b.created_ms.cmp(&a.created_ms));
    Json(items).into_response()
}

pub async fn get_blob(
    State(state): State<HubState>,
    Path((folder, name)): Path<(String, String)>,
) -> Response {
    let folder = match parse_folder(&folder) {
        Ok(folder) => folder,
        Err(response) => return response,
    };
    if !valid_name(&name) {
        return (StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }

    match tokio::fs::read(blob_path(&state, folder, &name)).await {
        Ok(bytes) => bytes.into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Failed reading blob {}/{}: {}", folder, name, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn delete_blob(
    State(state): State<HubState>,
    Path((folder, name)): Path<(String, String)>,
) -> Response {
    let folder = match parse_folder(&folder) {
        Ok(folder) => folder,
        Err(response) => return response,
    };
    if !valid_name(&name) {
        return (StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }

    match tokio::fs::remove_file(blob_path(&state, folder, &name)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        // Absence is not a failure.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::error!("Failed deleting blob {}/{}: {}", folder, name, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
