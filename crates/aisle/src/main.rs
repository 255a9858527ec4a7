//! aisle CLI: provisions dataset tables and loads producer output into PostgreSQL.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use aisle::{Config, ConfigArgs, DatasetId, RunOptions, init_tracing, run_pipeline};

/// Load retailer catalog batches into PostgreSQL.
#[derive(Debug, Parser)]
#[command(name = "aisle", version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Only run this dataset (repeatable).
    #[arg(long = "dataset", value_name = "ID")]
    datasets: Vec<String>,

    /// Create missing tables and exit.
    #[arg(long)]
    provision_only: bool,

    /// Take a database snapshot even if today is not the configured weekday.
    #[arg(long)]
    snapshot: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let paths = cli.config.config_paths();
    if paths.is_empty() {
        eprintln!("Error: no config files or directories specified");
        return ExitCode::FAILURE;
    }

    info!("Loading config from {} source(s)", paths.len());

    let config = match Config::from_paths(&paths) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting aisle with {} dataset(s)", config.dataset_count());

    let options = RunOptions {
        datasets: cli.datasets.into_iter().map(DatasetId::new).collect(),
        provision_only: cli.provision_only,
        force_snapshot: cli.snapshot,
    };

    match run_pipeline(config, options).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => {
            eprintln!("Ingest run finished with failed or skipped datasets");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Ingest run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
