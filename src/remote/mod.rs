//! Client abstraction over the live remote tree.
//!
//! The remote store is a hierarchical JSON tree with push subscriptions:
//! subscribing delivers the current state of the subtree immediately, then a
//! fresh snapshot on every change under the path. Writes and deletes are
//! acknowledged asynchronously.

pub mod memory;
pub mod proto;
pub mod tree;
pub mod ws;

pub use memory::MemoryStore;
pub use ws::WsStore;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Errors from remote store operations.
#[derive(Debug, Clone)]
pub enum RemoteError {
    /// The connection to the backend failed or was lost.
    Connection(String),
    /// The backend rejected a write or delete.
    Rejected { path: String, message: String },
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Connection(e) => write!(f, "Remote connection error: {}", e),
            RemoteError::Rejected { path, message } => {
                write!(f, "Remote rejected operation on '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for RemoteError {}

/// One notification from a live listener.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The full current state of the subscribed subtree
    /// (`Value::Null` when the subtree is absent).
    Snapshot(Value),
    /// The listener was cancelled by the backend or the connection dropped.
    /// No further snapshots will arrive; the last one remains valid.
    Lost(String),
}

/// A live listener on one path. Cancellable: dropping the subscription or
/// calling [`Subscription::cancel`] detaches it.
pub struct Subscription {
    rx: mpsc::Receiver<StoreEvent>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::Receiver<StoreEvent>) -> Self {
        Self { rx }
    }

    /// Waits for the next notification. Returns `None` once the listener is
    /// detached and drained.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        self.rx.recv().await
    }

    /// Detaches the listener. Already-delivered notifications can still be
    /// received; no new ones arrive.
    pub fn cancel(&mut self) {
        self.rx.close();
    }
}

/// The client-observable contract of the remote backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Replaces the node at `path` with `value`.
    async fn put(&self, path: &str, value: Value) -> Result<(), RemoteError>;

    /// Removes the node at `path`. Removing an absent node succeeds.
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    /// Establishes a live listener on `path`. The subscription fires
    /// immediately with the current state, then on every change under the
    /// path.
    async fn subscribe(&self, path: &str) -> Result<Subscription, RemoteError>;
}
