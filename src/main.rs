//! Budgetsync CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "budgetsync")]
#[command(about = "Keep a budget in sync with the budget API and edit it in plain words", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to ./budgetsync.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current budget
    Show {
        /// Bypass the cache
        #[arg(short, long)]
        refresh: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Apply a plain-text instruction, e.g. "increase Food by 500"
    Say {
        /// The instruction
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the budget with the contents of a JSON file
    Update {
        /// File in server or local-mirror shape
        file: PathBuf,
    },
    /// Clear the budget on the server and locally
    Reset,
    /// Poll for changes until interrupted
    Watch {
        /// Poll interval in seconds (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Print the effective configuration
    Config,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("budgetsync={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::Version = cli.command {
        println!("budgetsync v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = budgetsync_core::BudgetConfig::load(cli.config.as_deref())?;
    tracing::debug!("Endpoints: {:?}", config.remote.endpoints);

    match cli.command {
        Commands::Show { refresh, json } => commands::show(&config, refresh, json).await,
        Commands::Say { message, json } => commands::say(&config, &message.join(" "), json).await,
        Commands::Update { file } => commands::update(&config, &file).await,
        Commands::Reset => commands::reset(&config).await,
        Commands::Watch { interval } => {
            commands::watch(&config, interval.map(std::time::Duration::from_secs)).await
        }
        Commands::Config => commands::config(&config),
        Commands::Version => Ok(()),
    }
}
