//! Realtime hub: the backend counterpart the feeder clients talk to.
//!
//! Serves the live JSON tree over WebSocket and blob storage over HTTP.
//! The tree lives in a [`MemoryStore`] and is persisted best-effort to
//! `tree.json` in the data directory after every mutation.

pub mod blobs;
pub mod ws;

use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::remote::MemoryStore;

const TREE_FILE: &str = "tree.json";

/// Shared hub state.
#[derive(Clone)]
pub struct HubState {
    pub store: MemoryStore,
    data_dir: PathBuf,
}

impl HubState {
    /// Opens the hub state, reloading a previously persisted tree if one
    /// exists.
    pub fn open(data_dir: PathBuf) -> Self {
        let tree_path = data_dir.join(TREE_FILE);
        let store = match std::fs::read_to_string(&tree_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(tree) => {
                    tracing::info!("Reloaded tree from {}", tree_path.display());
                    MemoryStore::with_tree(tree)
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable {}: {}", tree_path.display(), e);
                    MemoryStore::new()
                }
            },
            Err(_) => MemoryStore::new(),
        };

        Self { store, data_dir }
    }

    /// Writes the current tree to disk. Persistence is best-effort; a
    /// failure is logged and the hub keeps serving from memory.
    pub async fn persist(&self) {
        let tree = self.store.export().await;
        let path = self.data_dir.join(TREE_FILE);
        let contents = match serde_json::to_vec_pretty(&tree) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to encode tree for persistence: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&path, contents).await {
            tracing::warn!("Failed to persist tree to {}: {}", path.display(), e);
        }
    }

    /// Directory holding a blob folder's files.
    pub fn blob_dir(&self, folder: &str) -> PathBuf {
        self.data_dir.join("blobs").join(folder)
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Builds the hub router.
pub fn router(state: HubState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_handler))
        .route("/blobs/{folder}", get(blobs::list_blobs))
        .route(
            "/blobs/{folder}/{name}",
            put(blobs::put_blob)
                .get(blobs::get_blob)
                .delete(blobs::delete_blob),
        )
        .with_state(state)
        // Recordings and captures can be tens of megabytes.
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaClient, MediaFolder};
    use crate::models::Schedule;
    use crate::remote::tree::get_path;
    use crate::remote::{RemoteStore, StoreEvent, WsStore};
    use crate::stores::{ScheduleEvent, ScheduleStore};
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    async fn spawn_hub() -> (String, HubState, TempDir) {
        let temp = TempDir::new().unwrap();
        let state = HubState::open(temp.path().to_path_buf());
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), state, temp)
    }

    async fn recv_snapshot(sub: &mut crate::remote::Subscription) -> serde_json::Value {
        match timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out waiting for snapshot")
            .expect("subscription closed")
        {
            StoreEvent::Snapshot(value) => value,
            StoreEvent::Lost(reason) => panic!("listener lost: {}", reason),
        }
    }

    #[tokio::test]
    async fn test_ws_subscribe_fires_immediately_then_on_change() {
        let (url, _state, _temp) = spawn_hub().await;
        let store = WsStore::connect(&url).await.unwrap();

        let mut sub = store.subscribe("Variables").await.unwrap();
        assert!(recv_snapshot(&mut sub).await.is_null());

        store.put("Variables/FeedNow", json!(true)).await.unwrap();
        let snapshot = recv_snapshot(&mut sub).await;
        assert_eq!(snapshot["FeedNow"], json!(true));
    }

    #[tokio::test]
    async fn test_ws_echo_reaches_other_clients() {
        let (url, _state, _temp) = spawn_hub().await;
        let writer = WsStore::connect(&url).await.unwrap();
        let observer = WsStore::connect(&url).await.unwrap();

        let mut sub = observer.subscribe("Schedules").await.unwrap();
        recv_snapshot(&mut sub).await;

        writer
            .put("Schedules/0", json!({ "id": 0, "enable": true }))
            .await
            .unwrap();

        let snapshot = recv_snapshot(&mut sub).await;
        assert_eq!(snapshot["0"]["enable"], json!(true));
    }

    #[tokio::test]
    async fn test_ws_delete_is_idempotent() {
        let (url, _state, _temp) = spawn_hub().await;
        let store = WsStore::connect(&url).await.unwrap();

        store.put("Schedules/1", json!({ "id": 1 })).await.unwrap();
        store.delete("Schedules/1").await.unwrap();
        store.delete("Schedules/1").await.unwrap();
    }

    #[tokio::test]
    async fn test_ws_rejects_empty_path() {
        let (url, _state, _temp) = spawn_hub().await;
        let store = WsStore::connect(&url).await.unwrap();

        let result = store.put("", json!(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_schedule_store_over_ws_end_to_end() {
        let (url, _state, _temp) = spawn_hub().await;
        let remote = Arc::new(WsStore::connect(&url).await.unwrap());
        let store = ScheduleStore::new(remote);

        let mut events = store.events();
        let _listener = store.subscribe().await.unwrap();

        // Initial empty snapshot.
        loop {
            if let ScheduleEvent::Replaced(collection) =
                timeout(Duration::from_secs(2), events.recv())
                    .await
                    .unwrap()
                    .unwrap()
            {
                assert!(collection.is_empty());
                break;
            }
        }

        let id = store.add(Schedule::new(18, 0)).await.unwrap();
        assert_eq!(id, 0);

        loop {
            if let ScheduleEvent::Replaced(collection) =
                timeout(Duration::from_secs(2), events.recv())
                    .await
                    .unwrap()
                    .unwrap()
            {
                assert_eq!(collection.len(), 1);
                assert_eq!(collection[0].id, 0);
                assert_eq!(collection[0].time_hour, 18);
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_tree_persists_across_restart() {
        let (url, state, temp) = spawn_hub().await;
        let store = WsStore::connect(&url).await.unwrap();
        store
            .put("Variables/MainFoodLevel", json!(0.5))
            .await
            .unwrap();

        // Writes persist asynchronously after the ack; give the hub a tick.
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(state);

        let reopened = HubState::open(temp.path().to_path_buf());
        let tree = reopened.store.export().await;
        assert_eq!(get_path(&tree, "Variables/MainFoodLevel"), json!(0.5));
    }

    #[tokio::test]
    async fn test_blob_upload_progress_is_monotonic_and_ends_at_100() {
        let (url, _state, _temp) = spawn_hub().await;
        let client = MediaClient::new(&url);

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("clip.m4a");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(&vec![7u8; 10 * 1024 * 1024]).unwrap();
        drop(file);

        let reports: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);

        let uploaded = client
            .upload_with_progress(MediaFolder::Audio, "clip.m4a", &file_path, move |pct| {
                sink.lock().unwrap().push(pct);
            })
            .await
            .unwrap();
        assert!(uploaded.ends_with("/blobs/audio/clip.m4a"));

        let reports = reports.lock().unwrap();
        assert!(!reports.is_empty());
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*reports.last().unwrap(), 100);
        assert_eq!(reports.iter().filter(|p| **p == 100).count(), 1);
    }

    #[tokio::test]
    async fn test_blob_upload_failure_reports_zero() {
        // Nothing listens here.
        let client = MediaClient::new("http://127.0.0.1:9");

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("clip.m4a");
        std::fs::write(&file_path, b"audio").unwrap();

        let reports: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);

        let result = client
            .upload_with_progress(MediaFolder::Audio, "clip.m4a", &file_path, move |pct| {
                sink.lock().unwrap().push(pct);
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*reports.lock().unwrap().last().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blob_list_newest_first_and_delete_idempotent() {
        let (url, _state, _temp) = spawn_hub().await;
        let client = MediaClient::new(&url);

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("clip.m4a");
        std::fs::write(&file_path, b"audio bytes").unwrap();

        client
            .upload_with_progress(MediaFolder::Audio, "first.m4a", &file_path, |_| {})
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client
            .upload_with_progress(MediaFolder::Audio, "second.m4a", &file_path, |_| {})
            .await
            .unwrap();

        let items = client.list(MediaFolder::Audio).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].created_ms >= items[1].created_ms);
        assert_eq!(items[0].size, 11);

        // Image folder is separate.
        assert!(client.list(MediaFolder::Images).await.unwrap().is_empty());

        client
            .delete(MediaFolder::Audio, "first.m4a")
            .await
            .unwrap();
        client
            .delete(MediaFolder::Audio, "first.m4a")
            .await
            .unwrap();
        assert_eq!(client.list(MediaFolder::Audio).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blob_rejects_unknown_folder_and_bad_names() {
        let (url, state, _temp) = spawn_hub().await;
        let http = reqwest::Client::new();

        let status = http
            .put(format!("{}/blobs/video/clip.mp4", url))
            .body("data")
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

        // Traversal names never survive URL normalization into a route, so
        // exercise the handler's own check directly.
        for name in ["..", ".", "a/b", "a\\b", ""] {
            let response = blobs::put_blob(
                axum::extract::State(state.clone()),
                axum::extract::Path(("audio".to_string(), name.to_string())),
                axum::body::Bytes::from_static(b"data"),
            )
            .await;
            assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        }

        // Nothing was written for any rejected name.
        assert!(!state.blob_dir("audio").exists());
    }
}
