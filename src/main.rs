use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod commands;

use commands::{ConfigCommand, DiaryCommand, FoodCommand};
use nutrilog::{Config, NutritionDiary};

#[derive(Parser)]
#[command(name = "nutrilog")]
#[command(version)]
#[command(about = "A local nutrition diary", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search and manage catalog foods
    Food(FoodCommand),

    /// Log, show and watch diary entries
    Diary(DiaryCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutrilog=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
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
        Some(Commands::Food(cmd)) => {
            let diary = NutritionDiary::open(&config).await?;
            cmd.run(&diary).await?;
        }
        Some(Commands::Diary(cmd)) => {
            let diary = NutritionDiary::open(&config).await?;
            cmd.run(&diary, &config).await?;
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
