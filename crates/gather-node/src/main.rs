use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod logging;
mod node;

#[derive(Parser)]
#[command(name = "gather")]
#[command(about = "Gather - community events and rewards node", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gather node
    Start {
        /// Data directory for storage
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Seconds between event status checks
        #[arg(long, default_value = "60")]
        tick_secs: u64,
    },

    /// Initialize a new node configuration
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Run one event end to end against the mock ledger
    Demo {
        /// Number of attendees to register and check in
        #[arg(short, long, default_value = "3")]
        attendees: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (ignore if it doesn't)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load config early to get logging settings
    let temp_config = if let Some(ref config_path) = cli.config {
        config::NodeConfig::from_file(config_path).ok()
    } else if Path::new("./gather-config.toml").exists() {
        config::NodeConfig::from_file(Path::new("./gather-config.toml")).ok()
    } else {
        None
    };

    let logging_config = temp_config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();

    if cli.verbose == 0 && std::env::var("RUST_LOG").is_err() {
        logging::display_boot_banner(env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = logging::init_logging(&logging_config, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        // Fall back to basic logging
        let log_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| format!("gather={}", log_level)),
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Start {
            data_dir,
            tick_secs,
        } => {
            // Priority order: CLI args > ENV vars > config file > defaults
            let mut config = if let Some(config_path) = cli.config {
                config::NodeConfig::from_file(&config_path)?
            } else if Path::new("./gather-config.toml").exists() {
                config::NodeConfig::from_file(Path::new("./gather-config.toml"))?
            } else {
                config::NodeConfig::default()
            };

            config.apply_env_overrides();

            // Clap fills defaults in, so only flags that differ from the
            // defaults count as explicit overrides.
            if data_dir != PathBuf::from("./data") {
                config.node.data_dir = data_dir;
            }
            if tick_secs != 60 {
                config.scheduler.tick_secs = tick_secs;
            }

            info!(
                version = env!("CARGO_PKG_VERSION"),
                data_dir = ?config.node.data_dir,
                tick_secs = config.scheduler.tick_secs,
                storage = %config.storage.backend,
                chain = %config.chain.mode,
                "🚀 Starting gather node"
            );

            let node = node::GatherNode::new(config).await?;
            info!(name = %node.name(), "✅ Node initialized successfully");

            let scheduler_handle = node.scheduler.start();
            info!("✅ Node ready, scheduler running");

            // Wait for shutdown signal
            tokio::signal::ctrl_c().await?;
            info!("🛑 Shutting down gracefully");

            scheduler_handle.abort();
            node.shutdown().await?;

            Ok(())
        }

        Commands::Init { output } => {
            info!(output_dir = ?output, "Initializing new node configuration");

            std::fs::create_dir_all(&output)?;
            let config = config::NodeConfig::default();
            let config_path = output.join("gather-config.toml");
            config.save_to_file(&config_path)?;
            info!(path = ?config_path, "✅ Configuration saved");

            Ok(())
        }

        Commands::Demo { attendees } => cli::run_demo(attendees).await,
    }
}
