//! Write-through stores mirroring the remote tree.
//!
//! Both stores follow the same consistency model: local state is always the
//! last full snapshot broadcast by the remote store. Writes go to the remote
//! tree and are reflected locally only once the live listener echoes them
//! back.

pub mod schedule;
pub mod variables;

pub use schedule::{ScheduleEvent, ScheduleStore};
pub use variables::{VariablesEvent, VariablesStore};

use tokio::task::JoinHandle;

use crate::remote::RemoteError;

/// Errors from store operations.
#[derive(Debug)]
pub enum StoreError {
    /// The remote store refused or could not complete the operation.
    Remote(RemoteError),
    /// A portion size outside 1..=3 was rejected before any remote I/O.
    InvalidPortionSize(i64),
    /// A record could not be encoded for the wire.
    Encode(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Remote(e) => write!(f, "Remote store error: {}", e),
            StoreError::InvalidPortionSize(size) => {
                write!(f, "Invalid portion size {} (expected 1, 2 or 3)", size)
            }
            StoreError::Encode(e) => write!(f, "Failed to encode record: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<RemoteError> for StoreError {
    fn from(e: RemoteError) -> Self {
        StoreError::Remote(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Encode(e)
    }
}

/// Handle to a running listener task. Cancelling (or dropping) the handle
/// stops the task; the store keeps its last-known-good state.
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
