//! Fleet-telemetry bridge client
//!
//! Connects to a remote broker over a persistent WebSocket and runs the
//! priority-aware, no-drop-preserving message scheduler that meters
//! outbound delivery under the peer's in-flight window.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use fleetbridge::cli::commands;
use fleetbridge::config::Config;

#[derive(Parser)]
#[command(name = "fleetbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and run the scheduler until killed
    Start,

    /// Show the effective configuration
    Config,

    /// Probe broker connectivity without starting the scheduler
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration first so verbosity can drive the tracing filter.
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let default_level = match config.verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("fleetbridge={default_level}").parse().unwrap()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let result = match cli.command {
        Commands::Start => commands::start(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
