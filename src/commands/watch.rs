use std::sync::Arc;

use clap::Args;

use crate::config::Config;
use crate::connectivity::{spawn_probe_events, ConnectivityMonitor, HttpProbe};
use crate::stores::{ScheduleEvent, VariablesEvent};

use super::{connect, synced_schedules, synced_variables};

/// Follow live feeder state until interrupted.
#[derive(Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let remote = connect(config).await?;

        let probe = Arc::new(HttpProbe::new(&config.hub_url));
        let events = spawn_probe_events(probe.clone(), config.probe_interval());
        let monitor = ConnectivityMonitor::start(probe, events).await;
        let mut connectivity = monitor.watch();

        let (schedule_store, _schedule_listener, collection) =
            synced_schedules(Arc::clone(&remote)).await?;
        let (variables_store, _variables_listener, vars) =
            synced_variables(remote, config).await?;

        println!(
            "Watching feeder at {} ({}). Ctrl-C to stop.",
            config.hub_url,
            if monitor.is_connected() {
                "online"
            } else {
                "offline"
            }
        );
        println!("{} schedule(s), food level {:.0}%", collection.len(), vars.main_food_level * 100.0);

        let mut schedule_events = schedule_store.events();
        let mut variable_events = variables_store.events();

        loop {
            tokio::select! {
                event = schedule_events.recv() => match event {
                    Ok(ScheduleEvent::Replaced(collection)) => {
                        println!("Schedules updated: {} rule(s)", collection.len());
                        for schedule in &collection {
                            println!(
                                "  [{}] {} {} ({})",
                                schedule.id,
                                schedule.time_label(),
                                schedule.days_summary(),
                                if schedule.enabled { "enabled" } else { "disabled" }
                            );
                        }
                    }
                    Ok(ScheduleEvent::ListenerError(reason)) => {
                        println!("Schedule listener error: {}", reason);
                    }
                    Err(_) => break,
                },
                event = variable_events.recv() => match event {
                    Ok(VariablesEvent::Replaced(vars)) => {
                        println!(
                            "Variables updated: feeding={} level={:.0}% portion={} alert={}",
                            vars.feed_now,
                            vars.main_food_level * 100.0,
                            vars.portion_size,
                            vars.intruder_alert
                        );
                    }
                    Ok(VariablesEvent::ListenerError(reason)) => {
                        println!("Variables listener error: {}", reason);
                    }
                    Err(_) => break,
                },
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *connectivity.borrow();
                    println!("Network: {}", if online { "connected" } else { "disconnected" });
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping.");
                    break;
                }
            }
        }

        Ok(())
    }
}
