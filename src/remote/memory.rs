//! In-process remote store, used by the hub as its live tree and by tests
//! as a backend double.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use super::tree::{delete_path, get_path, paths_related, set_path};
use super::{RemoteError, RemoteStore, StoreEvent, Subscription};

const SUBSCRIPTION_BUFFER: usize = 64;

struct Listener {
    path: String,
    tx: mpsc::Sender<StoreEvent>,
}

struct Inner {
    tree: Value,
    listeners: Vec<Listener>,
}

/// A [`RemoteStore`] backed by an in-memory JSON tree.
///
/// Cloning shares the tree; every clone sees the same state and the same
/// listeners.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_tree(Value::Null)
    }

    /// Creates a store seeded with an existing tree (hub restart path).
    pub fn with_tree(tree: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tree,
                listeners: Vec::new(),
            })),
        }
    }

    /// A copy of the whole tree, for persistence.
    pub async fn export(&self) -> Value {
        self.inner.lock().await.tree.clone()
    }

    /// Delivers fresh snapshots to every listener related to `path`,
    /// pruning listeners whose receivers are gone.
    ///
    /// Delivery happens under the tree lock so each listener receives
    /// snapshots in mutation order; releasing first would let a concurrent
    /// write deliver an older snapshot last.
    async fn notify(&self, path: &str) {
        let mut inner = self.inner.lock().await;
        let mut dead = false;

        for listener in &inner.listeners {
            if !paths_related(&listener.path, path) {
                continue;
            }
            let snapshot = get_path(&inner.tree, &listener.path);
            if listener
                .tx
                .send(StoreEvent::Snapshot(snapshot))
                .await
                .is_err()
            {
                dead = true;
            }
        }

        if dead {
            inner.listeners.retain(|l| !l.tx.is_closed());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn put(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        {
            let mut inner = self.inner.lock().await;
            set_path(&mut inner.tree, path, value);
        }
        self.notify(path).await;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let removed = {
            let mut inner = self.inner.lock().await;
            delete_path(&mut inner.tree, path)
        };
        // Absence is not a failure; only notify when something changed.
        if removed {
            self.notify(path).await;
        }
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, RemoteError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        // Fires immediately with current state, then on every change. The
        // initial send stays under the lock so a concurrent write cannot
        // slip an older snapshot in after it.
        let mut inner = self.inner.lock().await;
        let initial = get_path(&inner.tree, path);
        let _ = tx.send(StoreEvent::Snapshot(initial)).await;
        inner.listeners.push(Listener {
            path: path.to_string(),
            tx,
        });

        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_fires_immediately_with_current_state() {
        let store = MemoryStore::new();
        store.put("Variables/FeedNow", json!(true)).await.unwrap();

        let mut sub = store.subscribe("Variables").await.unwrap();
        match sub.recv().await.unwrap() {
            StoreEvent::Snapshot(value) => assert_eq!(value, json!({ "FeedNow": true })),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribe_absent_path_yields_null() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("Schedules").await.unwrap();
        match sub.recv().await.unwrap() {
            StoreEvent::Snapshot(value) => assert!(value.is_null()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_under_subscribed_path_notifies() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("Schedules").await.unwrap();
        sub.recv().await.unwrap(); // initial

        store
            .put("Schedules/0", json!({ "id": 0, "enable": true }))
            .await
            .unwrap();

        match sub.recv().await.unwrap() {
            StoreEvent::Snapshot(value) => {
                assert_eq!(value["0"]["id"], json!(0));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrelated_write_does_not_notify() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("Schedules").await.unwrap();
        sub.recv().await.unwrap(); // initial

        store.put("Variables/FeedNow", json!(true)).await.unwrap();
        store.put("Schedules/0", json!({ "id": 0 })).await.unwrap();

        // The next event must be the Schedules snapshot, not Variables.
        match sub.recv().await.unwrap() {
            StoreEvent::Snapshot(value) => assert_eq!(value["0"]["id"], json!(0)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put("Schedules/1", json!({ "id": 1 })).await.unwrap();

        store.delete("Schedules/1").await.unwrap();
        store.delete("Schedules/1").await.unwrap();

        assert_eq!(store.export().await, json!({ "Schedules": {} }));
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_subscriber_at_latest_snapshot() {
        // Interleaved writers must never leave a subscriber with an older
        // snapshot than the tree's final state.
        for _ in 0..200 {
            let store = MemoryStore::new();
            let mut sub = store.subscribe("Variables").await.unwrap();

            let a = {
                let store = store.clone();
                tokio::spawn(async move { store.put("Variables/v", json!("a")).await })
            };
            let b = {
                let store = store.clone();
                tokio::spawn(async move { store.put("Variables/v", json!("b")).await })
            };
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            sub.cancel();
            let mut last = Value::Null;
            while let Some(StoreEvent::Snapshot(snapshot)) = sub.recv().await {
                last = snapshot;
            }
            assert_eq!(last, store.export().await);
        }
    }

    #[tokio::test]
    async fn test_cancelled_subscription_is_pruned() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("Schedules").await.unwrap();
        sub.recv().await.unwrap();
        sub.cancel();
        drop(sub);

        // Writes after cancellation still succeed.
        store.put("Schedules/0", json!({ "id": 0 })).await.unwrap();
        store.put("Schedules/1", json!({ "id": 1 })).await.unwrap();

        let inner = store.inner.lock().await;
        assert!(inner.listeners.is_empty());
    }
}
