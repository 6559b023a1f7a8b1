//! WebSocket handler for the live tree.
//!
//! Each connection multiplexes subscriptions and writes. Client frames are
//! answered in order through a single outbound channel, so the ack for a
//! subscribe always precedes its initial snapshot.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::remote::proto::{ClientFrame, ServerFrame};
use crate::remote::tree::segments;
use crate::remote::{RemoteStore, StoreEvent};

use super::HubState;

const OUTBOUND_BUFFER: usize = 64;

pub async fn ws_handler(State(state): State<HubState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: HubState) {
    let (sink, mut source) = socket.split();
    let (frames, outbound) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_frames(outbound, sink));
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Client socket error: {}", e);
                break;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => {
                    if handle_frame(frame, &state, &frames, &mut forwarders)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Ignoring malformed client frame: {}", e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    drop(frames);
    let _ = writer.await;
}

/// Handles one client frame. Errors only when the outbound channel is gone,
/// which means the connection is over.
async fn handle_frame(
    frame: ClientFrame,
    state: &HubState,
    frames: &mpsc::Sender<ServerFrame>,
    forwarders: &mut Vec<JoinHandle<()>>,
) -> Result<(), ()> {
    let seq = frame.seq();

    let reply = match frame {
        ClientFrame::Subscribe { path, .. } => {
            if segments(&path).is_empty() {
                ServerFrame::Error {
                    seq,
                    message: "empty path".to_string(),
                }
            } else {
                match state.store.subscribe(&path).await {
                    Ok(subscription) => {
                        // Queue the ack before the forwarder starts so it
                        // precedes the initial snapshot.
                        frames
                            .send(ServerFrame::Ack { seq })
                            .await
                            .map_err(|_| ())?;
                        forwarders.push(tokio::spawn(forward_snapshots(
                            path,
                            subscription,
                            frames.clone(),
                        )));
                        return Ok(());
                    }
                    Err(e) => ServerFrame::Error {
                        seq,
                        message: e.to_string(),
                    },
                }
            }
        }
        ClientFrame::Put { path, value, .. } => {
            if segments(&path).is_empty() {
                ServerFrame::Error {
                    seq,
                    message: "empty path".to_string(),
                }
            } else {
                match state.store.put(&path, value).await {
                    Ok(()) => {
                        state.persist().await;
                        ServerFrame::Ack { seq }
                    }
                    Err(e) => ServerFrame::Error {
                        seq,
                        message: e.to_string(),
                    },
                }
            }
        }
        ClientFrame::Delete { path, .. } => {
            if segments(&path).is_empty() {
                ServerFrame::Error {
                    seq,
                    message: "empty path".to_string(),
                }
            } else {
                match state.store.delete(&path).await {
                    Ok(()) => {
                        state.persist().await;
                        ServerFrame::Ack { seq }
                    }
                    Err(e) => ServerFrame::Error {
                        seq,
                        message: e.to_string(),
                    },
                }
            }
        }
    };

    frames.send(reply).await.map_err(|_| ())
}

/// Relays a subscription's snapshots into the connection's outbound channel.
async fn forward_snapshots(
    path: String,
    mut subscription: crate::remote::Subscription,
    frames: mpsc::Sender<ServerFrame>,
) {
    while let Some(event) = subscription.recv().await {
        let frame = match event {
            StoreEvent::Snapshot(value) => ServerFrame::Snapshot {
                path: path.clone(),
                value,
            },
            StoreEvent::Lost(_) => return,
        };
        if frames.send(frame).await.is_err() {
            return;
        }
    }
}

async fn write_frames(
    mut outbound: mpsc::Receiver<ServerFrame>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    while let Some(frame) = outbound.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode server frame: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}
