//! Schedule synchronization store.
//!
//! Mirrors the `Schedules` subtree as an ordered collection. Every remote
//! snapshot replaces the whole local collection; writes never mutate it
//! directly. Full replacement trades update efficiency for the guarantee
//! that the local view is exactly the backend's last broadcast.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::broadcast;

use crate::models::Schedule;
use crate::remote::{RemoteStore, StoreEvent};

use super::{ListenerHandle, StoreError};

/// Remote path of the schedule collection.
pub const SCHEDULES_PATH: &str = "Schedules";

const EVENT_BUFFER: usize = 32;

/// Notifications published to observers.
#[derive(Debug, Clone)]
pub enum ScheduleEvent {
    /// The collection was replaced from a remote snapshot.
    Replaced(Vec<Schedule>),
    /// The live listener failed; the previous collection is retained.
    ListenerError(String),
}

pub struct ScheduleStore {
    remote: Arc<dyn RemoteStore>,
    schedules: Arc<RwLock<Vec<Schedule>>>,
    events: broadcast::Sender<ScheduleEvent>,
}

impl ScheduleStore {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            remote,
            schedules: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    /// Establishes the live listener. Each snapshot rebuilds the collection
    /// in the order the backend provides its children; a listener failure is
    /// surfaced as an event without touching the collection.
    pub async fn subscribe(&self) -> Result<ListenerHandle, StoreError> {
        let mut subscription = self.remote.subscribe(SCHEDULES_PATH).await?;
        let schedules = Arc::clone(&self.schedules);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                match event {
                    StoreEvent::Snapshot(snapshot) => {
                        let collection = parse_collection(&snapshot);
                        tracing::debug!("Schedule snapshot: {} entries", collection.len());
                        *schedules.write().expect("schedule collection poisoned") =
                            collection.clone();
                        let _ = events.send(ScheduleEvent::Replaced(collection));
                    }
                    StoreEvent::Lost(reason) => {
                        tracing::warn!("Schedule listener lost: {}", reason);
                        let _ = events.send(ScheduleEvent::ListenerError(reason));
                    }
                }
            }
        });

        Ok(ListenerHandle::new(task))
    }

    /// Adds a schedule, assigning the next id (`max + 1`, 0 when empty).
    ///
    /// Returns the assigned id. The local collection is updated by the
    /// subscription echo, not here. Two clients adding concurrently can race
    /// on the id; the backend has no transactional counter and this mirrors
    /// its documented limitation.
    pub async fn add(&self, schedule: Schedule) -> Result<i64, StoreError> {
        let new_id = {
            let current = self.schedules.read().expect("schedule collection poisoned");
            current.iter().map(|s| s.id).max().map_or(0, |max| max + 1)
        };

        let mut record = schedule;
        record.id = new_id;

        self.remote
            .put(
                &format!("{}/{}", SCHEDULES_PATH, new_id),
                serde_json::to_value(&record)?,
            )
            .await?;

        tracing::debug!("Added schedule {}", new_id);
        Ok(new_id)
    }

    /// Overwrites the full record at the schedule's existing id.
    pub async fn update(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.remote
            .put(
                &format!("{}/{}", SCHEDULES_PATH, schedule.id),
                serde_json::to_value(schedule)?,
            )
            .await?;

        tracing::debug!("Updated schedule {}", schedule.id);
        Ok(())
    }

    /// Removes the record by id. Deleting an absent id succeeds.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.remote
            .delete(&format!("{}/{}", SCHEDULES_PATH, id))
            .await?;

        tracing::debug!("Deleted schedule {}", id);
        Ok(())
    }

    /// A copy of the last snapshot's collection.
    pub fn current(&self) -> Vec<Schedule> {
        self.schedules
            .read()
            .expect("schedule collection poisoned")
            .clone()
    }

    /// A new observer of collection replacements and listener errors.
    pub fn events(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.events.subscribe()
    }
}

/// Parses a `Schedules` snapshot into the ordered collection. Anything that
/// is not an object (including null for an absent subtree) is an empty
/// collection; each child decodes with per-field defaults.
fn parse_collection(snapshot: &Value) -> Vec<Schedule> {
    match snapshot.as_object() {
        Some(children) => children.values().map(Schedule::from_value).collect(),
        None => Vec::new(),
    }
}
