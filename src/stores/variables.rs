//! Device variables store.
//!
//! Mirrors the single `Variables` record with the same replace-on-snapshot
//! policy as the schedule store, and provides the targeted field writers.
//! No writer mutates local state optimistically: every local change becomes
//! visible through the subscription echo, uniformly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::models::DeviceVariables;
use crate::remote::{RemoteStore, StoreEvent};

use super::{ListenerHandle, StoreError};

/// Remote path of the device variables record.
pub const VARIABLES_PATH: &str = "Variables";

const EVENT_BUFFER: usize = 32;

fn field_path(field: &str) -> String {
    format!("{}/{}", VARIABLES_PATH, field)
}

fn valid_portion(size: i64) -> bool {
    (1..=3).contains(&size)
}

/// Notifications published to observers.
#[derive(Debug, Clone)]
pub enum VariablesEvent {
    /// The record was replaced from a remote snapshot.
    Replaced(DeviceVariables),
    /// The live listener failed; the previous record is retained.
    ListenerError(String),
}

pub struct VariablesStore {
    remote: Arc<dyn RemoteStore>,
    vars: watch::Sender<DeviceVariables>,
    events: broadcast::Sender<VariablesEvent>,
    feed_reset_delay: Duration,
    /// The pending feed-now reset, tied to the store's lifetime: dropping
    /// the store (or triggering again) aborts it.
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

impl VariablesStore {
    pub fn new(remote: Arc<dyn RemoteStore>, feed_reset_delay: Duration) -> Self {
        let (vars, _) = watch::channel(DeviceVariables::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            remote,
            vars,
            events,
            feed_reset_delay,
            reset_task: Mutex::new(None),
        }
    }

    /// Establishes the live listener on the `Variables` record.
    pub async fn subscribe(&self) -> Result<ListenerHandle, StoreError> {
        let mut subscription = self.remote.subscribe(VARIABLES_PATH).await?;
        let vars = self.vars.clone();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                match event {
                    StoreEvent::Snapshot(snapshot) => {
                        let record = DeviceVariables::from_value(&snapshot);
                        tracing::debug!(
                            "Variables snapshot: feed_now={} level={} portion={}",
                            record.feed_now,
                            record.main_food_level,
                            record.portion_size
                        );
                        // send_replace: the record must update even while
                        // nobody holds a watch receiver.
                        vars.send_replace(record.clone());
                        let _ = events.send(VariablesEvent::Replaced(record));
                    }
                    StoreEvent::Lost(reason) => {
                        tracing::warn!("Variables listener lost: {}", reason);
                        let _ = events.send(VariablesEvent::ListenerError(reason));
                    }
                }
            }
        });

        Ok(ListenerHandle::new(task))
    }

    /// Starts a feed cycle: writes `FeedNow = true`, then the portion size,
    /// then schedules the delayed `FeedNow = false` reset.
    ///
    /// A failed feed-now write aborts the whole chain. A failed portion
    /// write is logged and does not cancel the reset, which the device
    /// depends on to end the cycle. Triggering again replaces a still
    /// pending reset.
    pub async fn trigger_feed(&self, portion: i64) -> Result<(), StoreError> {
        if !valid_portion(portion) {
            return Err(StoreError::InvalidPortionSize(portion));
        }

        self.remote
            .put(&field_path("FeedNow"), Value::Bool(true))
            .await?;
        tracing::info!("Feed triggered (portion {})", portion);

        if let Err(e) = self
            .remote
            .put(&field_path("PotionSize"), json!(portion))
            .await
        {
            tracing::warn!("Portion size write failed after feed trigger: {}", e);
        }

        let remote = Arc::clone(&self.remote);
        let delay = self.feed_reset_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match remote.put(&field_path("FeedNow"), Value::Bool(false)).await {
                Ok(()) => tracing::debug!("Feed-now flag reset"),
                Err(e) => tracing::warn!("Feed-now reset failed: {}", e),
            }
        });

        let previous = self
            .reset_task
            .lock()
            .expect("reset task slot poisoned")
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }

        Ok(())
    }

    /// Waits for a pending feed-now reset to run to completion. Lets
    /// short-lived callers (the CLI) outlive the delay instead of aborting
    /// the reset on drop.
    pub async fn finish_pending_reset(&self) {
        let task = self
            .reset_task
            .lock()
            .expect("reset task slot poisoned")
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Writes the portion size. Values outside 1..=3 are rejected before
    /// any remote I/O.
    pub async fn set_portion_size(&self, size: i64) -> Result<(), StoreError> {
        if !valid_portion(size) {
            return Err(StoreError::InvalidPortionSize(size));
        }
        self.remote.put(&field_path("PotionSize"), json!(size)).await?;
        Ok(())
    }

    /// Writes the intruder alert flag. Local state updates through the
    /// subscription echo, like every other field.
    pub async fn set_intruder_alert(&self, enabled: bool) -> Result<(), StoreError> {
        self.remote
            .put(&field_path("IntruderAlert"), Value::Bool(enabled))
            .await?;
        Ok(())
    }

    /// The last snapshot's record.
    pub fn current(&self) -> DeviceVariables {
        self.vars.borrow().clone()
    }

    /// A watch on the mirrored record; always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<DeviceVariables> {
        self.vars.subscribe()
    }

    /// A new observer of record replacements and listener errors.
    pub fn events(&self) -> broadcast::Receiver<VariablesEvent> {
        self.events.subscribe()
    }
}

impl Drop for VariablesStore {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.reset_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::tree::get_path;
    use crate::remote::MemoryStore;
    use tokio::time::timeout;

    const SHORT_DELAY: Duration = Duration::from_millis(50);

    fn store() -> (VariablesStore, Arc<MemoryStore>) {
        let remote = Arc::new(MemoryStore::new());
        (
            VariablesStore::new(remote.clone(), SHORT_DELAY),
            remote,
        )
    }

    async fn next_replaced(rx: &mut broadcast::Receiver<VariablesEvent>) -> DeviceVariables {
        loop {
            let event = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out waiting for variables event")
                .expect("event channel closed");
            if let VariablesEvent::Replaced(record) = event {
                return record;
            }
        }
    }

    #[tokio::test]
    async fn test_snapshot_replaces_record_with_defaults() {
        let (store, remote) = store();
        remote
            .put("Variables", json!({ "MainFoodLevel": 0.4 }))
            .await
            .unwrap();

        let mut events = store.events();
        let _listener = store.subscribe().await.unwrap();

        let record = next_replaced(&mut events).await;
        assert_eq!(record.main_food_level, 0.4);
        assert!(!record.feed_now);
        assert_eq!(record.portion_size, 1);
        assert_eq!(record.next_feeding, "");
    }

    #[tokio::test]
    async fn test_trigger_feed_writes_flag_and_portion_then_resets() {
        let (store, remote) = store();

        store.trigger_feed(2).await.unwrap();

        let tree = remote.export().await;
        assert_eq!(get_path(&tree, "Variables/FeedNow"), json!(true));
        assert_eq!(get_path(&tree, "Variables/PotionSize"), json!(2));

        store.finish_pending_reset().await;

        let tree = remote.export().await;
        assert_eq!(get_path(&tree, "Variables/FeedNow"), json!(false));
        // Portion size survives the reset.
        assert_eq!(get_path(&tree, "Variables/PotionSize"), json!(2));
    }

    #[tokio::test]
    async fn test_trigger_feed_rejects_invalid_portion() {
        let (store, remote) = store();

        let result = store.trigger_feed(4).await;
        assert!(matches!(result, Err(StoreError::InvalidPortionSize(4))));

        // Nothing was forwarded to the remote store.
        assert!(remote.export().await.is_null());
    }

    #[tokio::test]
    async fn test_retrigger_replaces_pending_reset() {
        let (store, remote) = store();

        store.trigger_feed(1).await.unwrap();
        store.trigger_feed(3).await.unwrap();
        store.finish_pending_reset().await;

        let tree = remote.export().await;
        assert_eq!(get_path(&tree, "Variables/FeedNow"), json!(false));
        assert_eq!(get_path(&tree, "Variables/PotionSize"), json!(3));
    }

    #[tokio::test]
    async fn test_set_portion_size_boundary() {
        let (store, remote) = store();

        for size in [1, 2, 3] {
            store.set_portion_size(size).await.unwrap();
        }
        assert!(matches!(
            store.set_portion_size(0).await,
            Err(StoreError::InvalidPortionSize(0))
        ));
        assert!(matches!(
            store.set_portion_size(4).await,
            Err(StoreError::InvalidPortionSize(4))
        ));

        let tree = remote.export().await;
        assert_eq!(get_path(&tree, "Variables/PotionSize"), json!(3));
    }

    #[tokio::test]
    async fn test_intruder_alert_updates_through_echo_only() {
        let (store, remote) = store();
        let mut events = store.events();
        let _listener = store.subscribe().await.unwrap();
        next_replaced(&mut events).await;

        store.set_intruder_alert(true).await.unwrap();

        // The echo carries the new value; current() reflects it afterwards.
        let record = next_replaced(&mut events).await;
        assert!(record.intruder_alert);
        assert!(store.current().intruder_alert);

        let tree = remote.export().await;
        assert_eq!(get_path(&tree, "Variables/IntruderAlert"), json!(true));
    }

    #[tokio::test]
    async fn test_current_follows_snapshots_without_observers() {
        let (store, remote) = store();
        let _listener = store.subscribe().await.unwrap();

        remote.put("Variables/FeedNow", json!(true)).await.unwrap();

        // No watch receiver or event observer is held; current() must still
        // end up at the latest snapshot.
        timeout(Duration::from_secs(1), async {
            while !store.current().feed_now {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("current() never reflected the snapshot");
    }

    #[tokio::test]
    async fn test_watch_follows_snapshots() {
        let (store, remote) = store();
        let mut watch = store.watch();
        let _listener = store.subscribe().await.unwrap();

        remote
            .put("Variables/MainFoodLevel", json!(0.9))
            .await
            .unwrap();

        timeout(Duration::from_secs(1), async {
            loop {
                watch.changed().await.unwrap();
                if watch.borrow().main_food_level == 0.9 {
                    break;
                }
            }
        })
        .await
        .expect("watch never saw the update");
    }
}
