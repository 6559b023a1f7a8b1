//! Network connectivity monitor.
//!
//! A scoped resource: started alongside whatever observes it and stopped by
//! dropping it. "Network available" events mark the monitor connected
//! unconditionally; "network lost" events re-check actual reachability
//! before deciding, because another network path may still be up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Platform network notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A network with internet capability became available.
    Available,
    /// A network was lost. Other networks may still be active.
    Lost,
}

/// Capability check: does the device currently have a usable internet path?
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn has_internet(&self) -> bool;
}

/// Probe that treats a reachable hub health endpoint as "has internet".
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/health", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl NetworkProbe for HttpProbe {
    async fn has_internet(&self) -> bool {
        match self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Live connectivity state, released by dropping the monitor.
pub struct ConnectivityMonitor {
    state: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ConnectivityMonitor {
    /// Determines the initial state with a capability check, then follows
    /// network events until the event source closes or the monitor drops.
    pub async fn start(
        probe: Arc<dyn NetworkProbe>,
        mut events: mpsc::Receiver<NetworkEvent>,
    ) -> Self {
        let initial = probe.has_internet().await;
        let (tx, state) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let connected = match event {
                    NetworkEvent::Available => true,
                    // Another network may still be up; check instead of
                    // assuming disconnected.
                    NetworkEvent::Lost => probe.has_internet().await,
                };
                if tx.send(connected).is_err() {
                    break;
                }
            }
        });

        Self { state, task }
    }

    pub fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    /// A watch on the connectivity state for observers.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.clone()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Derives network events from periodic capability probes, for platforms
/// without native availability callbacks. Emits an event on every edge.
pub fn spawn_probe_events(
    probe: Arc<dyn NetworkProbe>,
    interval: Duration,
) -> mpsc::Receiver<NetworkEvent> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last = None;

        loop {
            ticker.tick().await;
            let up = probe.has_internet().await;
            if last == Some(up) {
                continue;
            }
            last = Some(up);
            let event = if up {
                NetworkEvent::Available
            } else {
                NetworkEvent::Lost
            };
            if tx.send(event).await.is_err() {
                return;
            }
        }
    });

    rx
}
