use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicator_sync::catalog::Catalog;
use indicator_sync::provider::FredClient;
use indicator_sync::sync::{SyncOptions, SyncPipeline};
use indicator_sync::{Result, SyncError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_tracing()?;
    match cli.command {
        Command::Sync(args) => execute_sync(args),
    }
}

fn execute_sync(args: SyncArgs) -> Result<()> {
    let api_key = args
        .api_key
        .or_else(|| std::env::var("FRED_API_KEY").ok())
        .unwrap_or_default();
    if api_key.is_empty() {
        warn!("no FRED API key configured; provider requests will fail");
    }

    let catalog = Catalog::open(&args.database)?;
    let provider = FredClient::new(api_key, args.requests_per_minute);
    let options = SyncOptions {
        start_date: args.start_date,
        end_date: args.end_date,
        full_refresh: args.full_refresh,
        default_start_date: args.default_start_date,
    };

    let mut pipeline = SyncPipeline::new(catalog, provider, options);
    let report = pipeline.run(&args.input)?;
    info!(
        rows = report.rows,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        skipped = report.skipped,
        failed = report.failed,
        observations = report.observations,
        "sync finished"
    );
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| SyncError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Synchronise the economic-indicator catalog and its FRED data."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the definition workbook against the catalog and fetch new
    /// observations.
    Sync(SyncArgs),
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Indicator definition workbook (xlsx).
    #[arg(long)]
    input: PathBuf,

    /// SQLite catalog file.
    #[arg(long, default_value = "fomc_data.db")]
    database: PathBuf,

    /// Fetch data starting from this date (YYYY-MM-DD).
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Fetch data up to this date (YYYY-MM-DD).
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Fallback start date when an indicator has no stored data.
    #[arg(long, default_value = "2010-01-01")]
    default_start_date: NaiveDate,

    /// Delete existing data points for each indicator before fetching.
    #[arg(long)]
    full_refresh: bool,

    /// FRED API key; falls back to the FRED_API_KEY environment variable.
    #[arg(long)]
    api_key: Option<String>,

    /// FRED API request budget per minute.
    #[arg(long, default_value_t = 30)]
    requests_per_minute: u32,
}
