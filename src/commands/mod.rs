//! CLI subcommands.

pub mod device;
pub mod media;
pub mod schedule;
pub mod watch;

pub use device::{FeedCommand, SetCommand, StatusCommand};
pub use media::MediaCommand;
pub use schedule::ScheduleCommand;
pub use watch::WatchCommand;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;

use crate::config::Config;
use crate::models::{DeviceVariables, Schedule};
use crate::remote::WsStore;
use crate::stores::{
    ListenerHandle, ScheduleEvent, ScheduleStore, VariablesEvent, VariablesStore,
};

/// How long a command waits for the first snapshot before giving up.
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn connect(config: &Config) -> Result<Arc<WsStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(WsStore::connect(&config.hub_url).await?))
}

/// Opens the schedule store and waits for the collection to arrive.
pub(crate) async fn synced_schedules(
    remote: Arc<WsStore>,
) -> Result<(ScheduleStore, ListenerHandle, Vec<Schedule>), Box<dyn std::error::Error>> {
    let store = ScheduleStore::new(remote);
    let mut events = store.events();
    let listener = store.subscribe().await?;

    let collection = timeout(SYNC_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(ScheduleEvent::Replaced(collection)) => return Ok(collection),
                Ok(ScheduleEvent::ListenerError(reason)) => return Err(reason),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err("schedule store closed".to_string()),
            }
        }
    })
    .await
    .map_err(|_| "timed out waiting for schedules from the hub")??;

    Ok((store, listener, collection))
}

/// Opens the variables store and waits for the record to arrive.
pub(crate) async fn synced_variables(
    remote: Arc<WsStore>,
    config: &Config,
) -> Result<(VariablesStore, ListenerHandle, DeviceVariables), Box<dyn std::error::Error>> {
    let store = VariablesStore::new(remote, config.feed_reset_delay());
    let mut events = store.events();
    let listener = store.subscribe().await?;

    let record = timeout(SYNC_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(VariablesEvent::Replaced(record)) => return Ok(record),
                Ok(VariablesEvent::ListenerError(reason)) => return Err(reason),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err("variables store closed".to_string()),
            }
        }
    })
    .await
    .map_err(|_| "timed out waiting for device variables from the hub")??;

    Ok((store, listener, record))
}
