//! Compare forecasting models on a daily price history
//!
//! Usage: cargo run --release --bin forecast_report -- --data eth.csv

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use forecast_bank::config::ReportConfig;
use forecast_bank::report::run_report;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fit, rank and combine forecasts of a daily log-price series")]
struct Args {
    /// Price history (CSV with a date and a price column)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Last training date (YYYY-MM-DD); the test window starts the next day
    #[arg(long)]
    train_end: Option<NaiveDate>,

    /// Seed for the stochastic models
    #[arg(long)]
    seed: Option<u64>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the accuracy table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write test-window forecasts as CSV
    #[arg(long)]
    forecasts: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => ReportConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => ReportConfig::default(),
    };

    if let Some(path) = args.data {
        config.data.path = Some(path);
    }
    if let Some(date) = args.train_end {
        config.split.set_train_end(date);
    }
    if let Some(seed) = args.seed {
        config.set_seed(seed);
    }
    if args.json.is_some() {
        config.output.json = args.json;
    }
    if args.csv.is_some() {
        config.output.csv = args.csv;
    }
    if args.forecasts.is_some() {
        config.output.forecasts = args.forecasts;
    }
    config.validate()?;

    let report = run_report(&config).context("running forecast comparison")?;
    println!("{}", report);
    report.write_outputs(&config)?;

    Ok(())
}
