//! EOIV sorter command line
//!
//! Reads a model dictionary (JSON object of model name to model document), runs the sorter and
//! writes the output model document.
//!
//! Usage:
//!   eoiv_sorter --input <FILE> [OPTIONS]
//!
//! Options:
//!   --output <FILE>      Result document path (stdout when absent)
//!   --config <FILE>      TOML run configuration
//!   --step-size <STEP>   Percentile grid step, overrides the config
//!   --smoothing <BOOL>   Force curve smoothing on or off
//!   --pretty             Pretty-print the result
//!   --verbose            Debug logging
//!
//! Example:
//!   RUST_LOG=eoiv_sorter=debug eoiv_sorter --input e_usd_models.json --pretty

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

use eoiv_sorter::{run_sorter_json, SorterConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "eoiv_sorter")]
#[command(version, about = "Estimate negative-IV probabilities and build the IV output model")]
struct Cli {
    /// Model dictionary JSON file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for the result document
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Percentile grid step
    #[arg(long)]
    step_size: Option<f64>,

    /// Force curve smoothing on or off, ignoring Settings.ApplySmoothing
    #[arg(long)]
    smoothing: Option<bool>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<SorterConfig> {
    let mut config = match &cli.config {
        Some(path) => SorterConfig::from_path(path)?,
        None => SorterConfig::standard(),
    };
    if let Some(step) = cli.step_size {
        config = config.with_step_size(step);
    }
    if let Some(apply) = cli.smoothing {
        config = config.with_smoothing(apply);
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    info!(
        input = %cli.input.display(),
        step_size = config.step_size,
        output_name = %config.output_name,
        "starting sorter run"
    );

    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read model dictionary {}", cli.input.display()))?;
    let result = run_sorter_json(&text, &config, cli.pretty)
        .with_context(|| format!("sorter run failed for {}", cli.input.display()))?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, result + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(output = %path.display(), "result document written");
        }
        None => println!("{}", result),
    }
    Ok(())
}
