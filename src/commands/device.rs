use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;

use super::{connect, synced_variables};

/// Show the feeder's current state.
#[derive(Args)]
pub struct StatusCommand {
    /// Print the raw record as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let remote = connect(config).await?;
        let (_store, _listener, vars) = synced_variables(remote, config).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&vars)?);
            return Ok(());
        }

        println!("Food level:     {:.0}%", vars.main_food_level * 100.0);
        println!("Portion size:   {}", portion_label(vars.portion_size));
        println!(
            "Feeding now:    {}",
            if vars.feed_now { "yes" } else { "no" }
        );
        println!(
            "Intruder alert: {}",
            if vars.intruder_alert { "on" } else { "off" }
        );
        if !vars.next_feeding.is_empty() {
            println!("Next feeding:   {}", vars.next_feeding);
        }
        Ok(())
    }
}

/// Trigger an immediate feed cycle.
#[derive(Args)]
pub struct FeedCommand {
    /// Portion size: 1 (small), 2 (medium) or 3 (large)
    #[arg(long, short, default_value_t = 1)]
    pub portion: i64,
}

impl FeedCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let remote = connect(config).await?;
        let (store, _listener, _vars) = synced_variables(remote, config).await?;

        store.trigger_feed(self.portion).await?;
        println!(
            "Feeding {} portion. Waiting for the cycle to finish...",
            portion_label(self.portion)
        );

        // Exiting before the delayed reset would leave the flag stuck true.
        store.finish_pending_reset().await;
        println!("Done.");
        Ok(())
    }
}

/// Change a device setting.
#[derive(Args)]
pub struct SetCommand {
    #[command(subcommand)]
    pub command: SetSubcommand,
}

#[derive(Subcommand)]
pub enum SetSubcommand {
    /// Set the portion size for scheduled feeds
    Portion {
        /// 1 (small), 2 (medium) or 3 (large)
        size: i64,
    },

    /// Turn the intruder alert on or off
    IntruderAlert {
        /// Desired state
        #[arg(value_enum)]
        state: OnOff,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    fn as_bool(self) -> bool {
        matches!(self, OnOff::On)
    }
}

impl SetCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let remote = connect(config).await?;
        let (store, _listener, _vars) = synced_variables(remote, config).await?;

        match &self.command {
            SetSubcommand::Portion { size } => {
                store.set_portion_size(*size).await?;
                println!("Portion size set to {} ({})", size, portion_label(*size));
            }
            SetSubcommand::IntruderAlert { state } => {
                store.set_intruder_alert(state.as_bool()).await?;
                println!(
                    "Intruder alert {}",
                    if state.as_bool() { "on" } else { "off" }
                );
            }
        }

        Ok(())
    }
}

fn portion_label(size: i64) -> &'static str {
    match size {
        1 => "small",
        2 => "medium",
        3 => "large",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portion_label() {
        assert_eq!(portion_label(1), "small");
        assert_eq!(portion_label(3), "large");
        assert_eq!(portion_label(9), "unknown");
    }

    #[test]
    fn test_on_off_as_bool() {
        assert!(OnOff::On.as_bool());
        assert!(!OnOff::Off.as_bool());
    }
}
