//! Wire frames exchanged between the client and the hub over WebSocket.
//!
//! Every client frame carries a sequence number; the hub answers each one
//! with an `ack` or `error` frame echoing it. `snapshot` frames are
//! unsolicited and carry the subscribed path so the client can route them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start a live listener on `path`.
    Subscribe { seq: u64, path: String },
    /// Replace the node at `path`.
    Put { seq: u64, path: String, value: Value },
    /// Remove the node at `path`.
    Delete { seq: u64, path: String },
}

impl ClientFrame {
    pub fn seq(&self) -> u64 {
        match self {
            ClientFrame::Subscribe { seq, .. }
            | ClientFrame::Put { seq, .. }
            | ClientFrame::Delete { seq, .. } => *seq,
        }
    }
}

/// Frames sent by the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerFrame {
    /// The operation with this sequence number succeeded.
    Ack { seq: u64 },
    /// The operation with this sequence number was rejected.
    Error { seq: u64, message: String },
    /// Current state of a subscribed subtree.
    Snapshot { path: String, value: Value },
}
