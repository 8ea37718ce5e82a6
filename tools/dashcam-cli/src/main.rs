//! Dashcam CLI: take photos and record clips on a scripted camera.
//!
//! Usage:
//!   dashcam photo [OPTIONS]    Capture still photos
//!   dashcam record [OPTIONS]   Record a video clip
//!   dashcam list               List stored media
//!   dashcam config [--init]    Show or write the configuration
//!   dashcam check              Validate the configuration and media store

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dashcam_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "dashcam",
    about = "Still capture and clip recording for a dashboard camera",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// How the synthetic camera behaves for each still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Metadata and matching buffer arrive promptly
    Matching,
    /// Neighbouring frames arrive before the matching buffer
    Stray,
    /// The buffer arrives after the capture timeout
    Late,
    /// The buffer never arrives
    Dropped,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture still photos
    Photo {
        /// Number of photos to take
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Device rotation in degrees
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        rotation: i32,

        /// Use the front-facing lens
        #[arg(long)]
        front: bool,

        /// Synthetic camera behaviour
        #[arg(long, value_enum, default_value = "matching")]
        scenario: Scenario,
    },

    /// Record a video clip
    Record {
        /// Stop after this many milliseconds (otherwise wait for Ctrl+C)
        #[arg(short, long)]
        duration_ms: Option<u64>,

        /// Pause this many milliseconds into the clip
        #[arg(long)]
        pause_at_ms: Option<u64>,

        /// How long to stay paused
        #[arg(long, default_value = "500")]
        pause_for_ms: u64,

        /// Device rotation in degrees
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        rotation: i32,
    },

    /// List stored photos and videos
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the configuration file with current values
        #[arg(long)]
        init: bool,
    },

    /// Validate the configuration and media store
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    dashcam_common::logging::init_logging(&logging);
    tracing::debug!(
        config = ?cli.config,
        media_dir = %config.media_dir.display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Photo {
            count,
            rotation,
            front,
            scenario,
        } => commands::photo::run(&config, count, rotation, front, scenario).await,
        Commands::Record {
            duration_ms,
            pause_at_ms,
            pause_for_ms,
            rotation,
        } => commands::record::run(&config, duration_ms, pause_at_ms, pause_for_ms, rotation).await,
        Commands::List { json } => commands::list::run(&config, json),
        Commands::Config { init } => commands::config::run(&config, cli.config, init),
        Commands::Check => commands::check::run(&config),
    }
}
