//! diagram-dl command-line entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use diagram_dl::{Config, Manifest, Orchestrator, OutputFormat, RunSummary};

/// Render PlantUML diagram sources to images through a PlantUML server
#[derive(Parser, Debug)]
#[command(name = "diagram-dl")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON manifest or directory of .puml files
    #[arg(default_value = "diagrams.json")]
    manifest: PathBuf,

    /// Path to configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Image format: png, svg or txt (overrides the config file)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> diagram_dl::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    config.validate()?;
    Ok(config)
}

fn print_summary(summary: &RunSummary, config: &Config) {
    let total = summary.total();
    println!();
    println!("Success: {}/{}", summary.success_count, total);
    println!("Failed: {}/{}", summary.failure_count, total);
    for name in summary.failed_names() {
        println!("  failed: {name}");
    }
    println!("Diagrams saved to: {}", config.output_dir.display());
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    let manifest = match Manifest::load(&args.manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!(manifest = %args.manifest.display(), error = %e, "cannot load diagrams");
            process::exit(1);
        }
    };

    let orchestrator = match Orchestrator::from_config(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "cannot initialise renderer");
            process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        diagrams = manifest.len(),
        "starting diagram-dl"
    );

    // Per-diagram failures are reported in the summary; the exit code stays 0.
    let summary = orchestrator.run_all(manifest.diagrams()).await;
    print_summary(&summary, orchestrator.config());
}
