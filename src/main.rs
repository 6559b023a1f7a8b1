use clap::{Parser, Subcommand};
use std::path::PathBuf;

use petfeeder::commands::{
    FeedCommand, MediaCommand, ScheduleCommand, SetCommand, StatusCommand, WatchCommand,
};
use petfeeder::config::Config;

#[derive(Parser)]
#[command(name = "petfeeder")]
#[command(version)]
#[command(about = "Control and monitor a networked pet feeder", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the feeder's current state
    Status(StatusCommand),

    /// Trigger an immediate feed cycle
    Feed(FeedCommand),

    /// Change a device setting
    Set(SetCommand),

    /// Manage the weekly feeding schedule
    Schedule(ScheduleCommand),

    /// Manage uploaded recordings and captures
    Media(MediaCommand),

    /// Follow live feeder state until interrupted
    Watch(WatchCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petfeeder=warn".into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Status(cmd)) => cmd.run(&config).await?,
        Some(Commands::Feed(cmd)) => cmd.run(&config).await?,
        Some(Commands::Set(cmd)) => cmd.run(&config).await?,
        Some(Commands::Schedule(cmd)) => cmd.run(&config).await?,
        Some(Commands::Media(cmd)) => cmd.run(&config).await?,
        Some(Commands::Watch(cmd)) => cmd.run(&config).await?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
