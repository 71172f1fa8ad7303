//! featurecalc - feature engineering from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use featurecalc_core::CalcConfig;

mod commands;
mod repl;

/// Default config file, picked up from the working directory
const DEFAULT_CONFIG: &str = "feature_calculator.yaml";

#[derive(Parser)]
#[command(name = "featurecalc")]
#[command(
    author,
    version,
    about = "Compute, validate and inspect machine-learning features"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (defaults to feature_calculator.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute features over a data file
    Compute {
        /// Input data file (CSV/TSV)
        #[arg(long)]
        data: PathBuf,

        /// Feature set file (YAML or JSON)
        #[arg(long)]
        spec: PathBuf,

        /// Output CSV path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Process the input in batches instead of loading it whole
        #[arg(long)]
        streaming: bool,
    },

    /// Compute features and check them against their spec rules
    Validate {
        /// Input data file (CSV/TSV)
        #[arg(long)]
        data: PathBuf,

        /// Feature set file (YAML or JSON)
        #[arg(long)]
        spec: PathBuf,
    },

    /// Print summary statistics per numeric column
    Stats {
        /// Input data file (CSV/TSV)
        #[arg(long)]
        data: PathBuf,

        /// Restrict to a single column
        #[arg(long)]
        column: Option<String>,
    },

    /// Print the inferred schema of a data file
    Schema {
        /// Input data file (CSV/TSV)
        #[arg(long)]
        data: PathBuf,
    },

    /// Interactive arithmetic calculator
    Repl,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Commands::Compute {
            data,
            spec,
            output,
            streaming,
        } => commands::compute(&config, &data, &spec, output.as_deref(), streaming),
        Commands::Validate { data, spec } => commands::validate(&config, &data, &spec),
        Commands::Stats { data, column } => commands::stats(&data, column.as_deref()),
        Commands::Schema { data } => commands::schema(&data),
        Commands::Repl => repl::run(),
    }
}

/// Load configuration: explicit file, default file when present, or
/// defaults plus environment overrides
fn load_config(path: Option<&Path>) -> Result<CalcConfig> {
    let config = match path {
        Some(path) => CalcConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => CalcConfig::load(DEFAULT_CONFIG)
            .with_context(|| format!("failed to load config from {}", DEFAULT_CONFIG))?,
        None => CalcConfig::from_env().context("failed to read configuration environment")?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
