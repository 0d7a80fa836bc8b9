use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

use commands::{ConfigCommand, PlantCommand};
use plantsync::{
    init_db, Config, HttpPlantApi, PlantApi, PlantRepository, PlantStore, PlantSyncActions,
};

#[derive(Parser)]
#[command(name = "plantsync")]
#[command(version)]
#[command(about = "Keep track of your plants", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage plants
    Plant(PlantCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plantsync=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Plant(cmd)) => {
            let api = open_api(&config).await?;
            let actions = PlantSyncActions::from_config(api, Arc::new(PlantStore::new()), &config);
            cmd.run(&actions).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Uses the plant server when one is configured, the local database otherwise.
async fn open_api(config: &Config) -> Result<Arc<dyn PlantApi>, Box<dyn std::error::Error>> {
    match &config.api_url.value {
        Some(url) => {
            tracing::debug!("Using plant server at {}", url);
            Ok(Arc::new(HttpPlantApi::new(
                url.clone(),
                config.api_key.value.clone(),
            )))
        }
        None => {
            let pool = init_db(&config.database_path.value).await?;
            Ok(Arc::new(PlantRepository::new(pool)))
        }
    }
}
