use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;
use crate::models::Schedule;

use super::{connect, synced_schedules};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Manage the weekly feeding schedule.
#[derive(Args)]
pub struct ScheduleCommand {
    #[command(subcommand)]
    pub command: ScheduleSubcommand,
}

#[derive(Subcommand)]
pub enum ScheduleSubcommand {
    /// List all feeding rules
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a feeding rule
    Add {
        /// Time of day (HH:MM)
        #[arg(long, short)]
        time: String,

        /// Days the rule fires, e.g. "mon,wed,fri" (default: none)
        #[arg(long, short)]
        days: Option<String>,

        /// Create the rule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Enable or disable a rule
    Toggle {
        /// Rule id
        id: i64,
    },

    /// Remove a rule
    Remove {
        /// Rule id
        id: i64,
    },
}

impl ScheduleCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let remote = connect(config).await?;

        match &self.command {
            ScheduleSubcommand::List { format } => {
                let (_store, _listener, collection) = synced_schedules(remote).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&collection)?)
                    }
                    OutputFormat::Text => print_schedules(&collection),
                }
            }

            ScheduleSubcommand::Add {
                time,
                days,
                disabled,
            } => {
                let (hour, minute) = parse_time(time)?;
                let day_flags = match days {
                    Some(days) => parse_days(days)?,
                    None => [false; 7],
                };

                let mut schedule = Schedule::new(hour, minute);
                schedule.enabled = !disabled;
                for (index, on) in day_flags.into_iter().enumerate() {
                    schedule.set_day(index, on);
                }

                // The id comes from the current collection, so sync first.
                let (store, _listener, _collection) = synced_schedules(remote).await?;
                let id = store.add(schedule).await?;
                println!("Added schedule {} at {}", id, time);
            }

            ScheduleSubcommand::Toggle { id } => {
                let (store, _listener, collection) = synced_schedules(remote).await?;
                let mut schedule = collection
                    .into_iter()
                    .find(|s| s.id == *id)
                    .ok_or_else(|| format!("No schedule with id {}", id))?;
                schedule.enabled = !schedule.enabled;
                store.update(&schedule).await?;
                println!(
                    "Schedule {} is now {}",
                    id,
                    if schedule.enabled { "enabled" } else { "disabled" }
                );
            }

            ScheduleSubcommand::Remove { id } => {
                let (store, _listener, _collection) = synced_schedules(remote).await?;
                store.delete(*id).await?;
                println!("Removed schedule {}", id);
            }
        }

        Ok(())
    }
}

fn print_schedules(collection: &[Schedule]) {
    if collection.is_empty() {
        println!("No feeding schedules.");
        return;
    }
    println!("{:<4} {:<6} {:<9} DAYS", "ID", "TIME", "ENABLED");
    for schedule in collection {
        println!(
            "{:<4} {:<6} {:<9} {}",
            schedule.id,
            schedule.time_label(),
            if schedule.enabled { "yes" } else { "no" },
            schedule.days_summary()
        );
    }
}

/// Parses "HH:MM" with hours in 0..=23 and minutes in 0..=59.
fn parse_time(time: &str) -> Result<(i64, i64), String> {
    let invalid = || format!("Invalid time '{}'. Use HH:MM.", time);
    let (hour, minute) = time.split_once(':').ok_or_else(invalid)?;
    let hour: i64 = hour.parse().map_err(|_| invalid())?;
    let minute: i64 = minute.parse().map_err(|_| invalid())?;
    if !(0..=23).contains(&hour) || !(0..=59).contains(&minute) {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Parses a comma-separated day list into week-order flags, Monday first.
fn parse_days(days: &str) -> Result<[bool; 7], String> {
    const NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
    let mut flags = [false; 7];
    for day in days.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let index = NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(day))
            .ok_or_else(|| format!("Unknown day '{}'. Use mon..sun.", day))?;
        flags[index] = true;
    }
    Ok(flags)
}
