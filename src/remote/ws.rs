//! WebSocket-backed remote store client.
//!
//! One socket multiplexes every operation: writes and deletes are correlated
//! with their acks by sequence number, and snapshot frames are routed to the
//! subscription registered for their path. A reader task owns the receive
//! half; a writer task owns the send half, fed through a channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::proto::{ClientFrame, ServerFrame};
use super::{RemoteError, RemoteStore, StoreEvent, Subscription};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const OUTBOUND_BUFFER: usize = 64;
const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Default)]
struct ConnState {
    next_seq: u64,
    /// Pending acks by sequence number, with the path for error reporting.
    pending: HashMap<u64, (String, oneshot::Sender<Result<(), RemoteError>>)>,
    /// Snapshot routes by subscribed path.
    listeners: HashMap<String, Vec<mpsc::Sender<StoreEvent>>>,
    /// Set once the socket is gone; every later operation fails fast.
    closed: Option<String>,
}

struct Shared {
    out: mpsc::Sender<Message>,
    state: Mutex<ConnState>,
}

/// A [`RemoteStore`] speaking the hub's WebSocket protocol.
#[derive(Clone)]
pub struct WsStore {
    shared: Arc<Shared>,
}

impl WsStore {
    /// Connects to a hub. Accepts http(s) or ws(s) URLs, or a bare host.
    pub async fn connect(base_url: &str) -> Result<Self, RemoteError> {
        let url = build_ws_url(base_url);
        let (socket, _) = connect_async(&url)
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        let (sink, source) = socket.split();

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let shared = Arc::new(Shared {
            out: out_tx,
            state: Mutex::new(ConnState::default()),
        });

        tokio::spawn(run_writer(out_rx, sink));
        tokio::spawn(run_reader(Arc::clone(&shared), source));

        Ok(Self { shared })
    }

    /// Sends a frame and waits for its ack.
    async fn request(
        &self,
        path: &str,
        build: impl FnOnce(u64) -> ClientFrame,
    ) -> Result<(), RemoteError> {
        let (frame, ack) = {
            let mut state = self.shared.state.lock().expect("ws state poisoned");
            if let Some(reason) = &state.closed {
                return Err(RemoteError::Connection(reason.clone()));
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            let (tx, rx) = oneshot::channel();
            state.pending.insert(seq, (path.to_string(), tx));
            (build(seq), rx)
        };

        let seq = frame.seq();
        let text = serde_json::to_string(&frame)
            .map_err(|e| RemoteError::Connection(format!("frame encoding failed: {}", e)))?;

        if self.shared.out.send(Message::Text(text.into())).await.is_err() {
            let mut state = self.shared.state.lock().expect("ws state poisoned");
            state.pending.remove(&seq);
            return Err(RemoteError::Connection("connection closed".to_string()));
        }

        match ack.await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Connection("connection closed".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for WsStore {
    async fn put(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        self.request(path, |seq| ClientFrame::Put {
            seq,
            path: path.to_string(),
            value,
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.request(path, |seq| ClientFrame::Delete {
            seq,
            path: path.to_string(),
        })
        .await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, RemoteError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        // Register the route before asking the hub, so the snapshot that
        // follows the ack cannot be dropped.
        {
            let mut state = self.shared.state.lock().expect("ws state poisoned");
            if let Some(reason) = &state.closed {
                return Err(RemoteError::Connection(reason.clone()));
            }
            state.listeners.entry(path.to_string()).or_default().push(tx);
        }

        let subscribed = self
            .request(path, |seq| ClientFrame::Subscribe {
                seq,
                path: path.to_string(),
            })
            .await;

        if let Err(e) = subscribed {
            drop(rx);
            let mut state = self.shared.state.lock().expect("ws state poisoned");
            if let Some(routes) = state.listeners.get_mut(path) {
                routes.retain(|route| !route.is_closed());
            }
            return Err(e);
        }

        Ok(Subscription::new(rx))
    }
}

async fn run_writer(mut outbound: mpsc::Receiver<Message>, mut sink: WsSink) {
    while let Some(message) = outbound.recv().await {
        if sink.send(message).await.is_err() {
            return;
        }
    }
    // Channel closed: the store was dropped, close the socket gracefully.
    let _ = sink.send(Message::Close(None)).await;
}

async fn run_reader(shared: Arc<Shared>, mut source: WsSource) {
    let reason = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                Ok(frame) => dispatch(&shared, frame).await,
                Err(e) => tracing::warn!("Ignoring malformed hub frame: {}", e),
            },
            Some(Ok(Message::Ping(payload))) => {
                let _ = shared.out.send(Message::Pong(payload)).await;
            }
            Some(Ok(Message::Close(_))) => break "connection closed by hub".to_string(),
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "connection closed".to_string(),
        }
    };

    fail_all(&shared, reason).await;
}

async fn dispatch(shared: &Arc<Shared>, frame: ServerFrame) {
    match frame {
        ServerFrame::Ack { seq } => {
            let entry = {
                let mut state = shared.state.lock().expect("ws state poisoned");
                state.pending.remove(&seq)
            };
            match entry {
                Some((_, ack)) => {
                    let _ = ack.send(Ok(()));
                }
                None => tracing::warn!("Ack for unknown seq {}", seq),
            }
        }
        ServerFrame::Error { seq, message } => {
            let entry = {
                let mut state = shared.state.lock().expect("ws state poisoned");
                state.pending.remove(&seq)
            };
            match entry {
                Some((path, ack)) => {
                    let _ = ack.send(Err(RemoteError::Rejected { path, message }));
                }
                None => tracing::warn!("Error for unknown seq {}: {}", seq, message),
            }
        }
        ServerFrame::Snapshot { path, value } => {
            let routes: Vec<mpsc::Sender<StoreEvent>> = {
                let state = shared.state.lock().expect("ws state poisoned");
                state.listeners.get(&path).cloned().unwrap_or_default()
            };
            let mut any_dead = false;
            for route in routes {
                if route
                    .send(StoreEvent::Snapshot(value.clone()))
                    .await
                    .is_err()
                {
                    any_dead = true;
                }
            }
            if any_dead {
                let mut state = shared.state.lock().expect("ws state poisoned");
                if let Some(routes) = state.listeners.get_mut(&path) {
                    routes.retain(|route| !route.is_closed());
                }
            }
        }
    }
}

/// Resolves every pending ack and listener with the loss reason, and marks
/// the connection closed so later operations fail fast.
async fn fail_all(shared: &Arc<Shared>, reason: String) {
    let (pending, listeners) = {
        let mut state = shared.state.lock().expect("ws state poisoned");
        state.closed = Some(reason.clone());
        (
            std::mem::take(&mut state.pending),
            std::mem::take(&mut state.listeners),
        )
    };

    for (_, (_, ack)) in pending {
        let _ = ack.send(Err(RemoteError::Connection(reason.clone())));
    }
    for (_, routes) in listeners {
        for route in routes {
            let _ = route.send(StoreEvent::Lost(reason.clone())).await;
        }
    }
}

/// Builds the hub's WebSocket endpoint URL, converting http(s) schemes.
fn build_ws_url(base_url: &str) -> String {
    let base = if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if !base_url.starts_with("ws://") && !base_url.starts_with("wss://") {
        format!("ws://{}", base_url)
    } else {
        base_url.to_string()
    };

    format!("{}/ws", base.trim_end_matches('/'))
}
