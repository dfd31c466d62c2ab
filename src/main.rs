// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use mealcam::backends::camera::types::{CameraBackendType, FacingMode};
use mealcam::config::Config;
use std::path::PathBuf;

mod cli;

use cli::{MealArgs, TargetArgs};

#[derive(Parser)]
#[command(name = "mealcam")]
#[command(about = "Photograph meals and track daily nutrition")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Camera backend (v4l2 or virtual)
    #[arg(long, global = true)]
    backend: Option<CameraBackendType>,

    /// Config file (default: ~/.config/mealcam/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Take a photo, optionally logging it as a meal
    Snap {
        /// Camera to use (back or front)
        #[arg(short, long)]
        facing: Option<FacingMode>,

        /// Switch the torch on before capturing
        #[arg(long)]
        flash: bool,

        /// Output file path (default: <data dir>/photos/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        meal: MealArgs,
    },

    /// Use an existing image instead of the camera
    Import {
        /// Image file to import
        file: PathBuf,

        /// Output file path (default: <data dir>/photos/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        meal: MealArgs,
    },

    /// Log a meal by hand
    Add {
        #[command(flatten)]
        meal: MealArgs,

        /// Photo to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Remove a logged meal
    Delete {
        /// Meal id (from 'mealcam today')
        id: String,
    },

    /// Show today's meals and progress towards the targets
    Today,

    /// Show or change the daily targets
    Targets {
        #[command(flatten)]
        targets: TargetArgs,
    },

    /// Show or change the profile
    Profile {
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=mealcam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    match cli.command {
        Commands::List => cli::list_cameras(&config)?,
        Commands::Snap {
            facing,
            flash,
            output,
            meal,
        } => cli::snap(&config, facing, flash, output, meal).await?,
        Commands::Import { file, output, meal } => {
            cli::import(&config, &file, output, meal).await?
        }
        Commands::Add { meal, image } => cli::add_meal(&config, meal, image).await?,
        Commands::Delete { id } => cli::delete_meal(&config, &id)?,
        Commands::Today => cli::show_today(&config)?,
        Commands::Targets { targets } => cli::targets(&config, targets)?,
        Commands::Profile { name } => cli::profile(&config, name)?,
    }

    Ok(())
}
