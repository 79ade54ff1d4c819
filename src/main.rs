//! geogrid: merchant registry geocoding and geohash grid partitioning

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use geogrid::batch::LookupMode;
use geogrid::config::{Config, LogFormat, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "geogrid")]
#[command(about = "Geocode a merchant registry and split it into geohash grid files")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode the merchant table, resuming from the last checkpoint
    Geocode {
        /// Merchant CSV (overrides [input].csv_path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Lookup mode: address or keyword
        #[arg(short, long)]
        mode: Option<LookupMode>,

        /// Ignore any existing checkpoint
        #[arg(long)]
        fresh: bool,

        /// Stop after this many records (checkpoint is saved)
        #[arg(long)]
        limit: Option<usize>,

        /// Quiet mode (no progress bar)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Partition geocoded stores into geohash grid files
    Grid {
        /// Geocoded dataset (defaults to [checkpoint].results_path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Geohash precision, 1-12
        #[arg(short, long)]
        precision: Option<u8>,

        /// Directory for per-cell files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Grid index manifest path
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Show checkpoint status
    Status {
        /// Checkpoint file (defaults to [checkpoint].checkpoint_path)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;

    // Setup logging
    let log_level = config.logging.level.with_verbosity(cli.verbose).to_tracing();
    match config.logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_target(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    match cli.command {
        Commands::Geocode {
            input,
            mode,
            fresh,
            limit,
            quiet,
        } => commands::geocode::run_geocode(config, input, mode, fresh, limit, quiet).await,
        Commands::Grid {
            input,
            precision,
            output_dir,
            index,
        } => commands::grid::build_grid(config, input, precision, output_dir, index).await,
        Commands::Status { checkpoint } => commands::status::show_status(config, checkpoint).await,
        Commands::Init { path, force } => commands::init::init_config(path, force).await,
    }
}
