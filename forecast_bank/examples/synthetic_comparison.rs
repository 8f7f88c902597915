//! Run the full comparison on a simulated daily price history
//!
//! Usage: cargo run --release --example synthetic_comparison

use chrono::NaiveDate;
use forecast_bank::config::ReportConfig;
use forecast_bank::data::PriceSeries;
use forecast_bank::report::run_report_for;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Geometric random walk with drift and a mild yearly cycle, 2019-2023
    let origin = NaiveDate::from_ymd_opt(2019, 1, 1).ok_or("invalid origin")?;
    let end = NaiveDate::from_ymd_opt(2023, 12, 31).ok_or("invalid end")?;
    let days = (end - origin).num_days() as usize + 1;

    let mut rng = StdRng::seed_from_u64(7);
    let shocks = Normal::new(0.0005, 0.03)?;
    let mut log_price = 5.0_f64;
    let prices: Vec<f64> = (0..days)
        .map(|t| {
            log_price += shocks.sample(&mut rng);
            let season = 0.05 * (2.0 * std::f64::consts::PI * t as f64 / 365.25).sin();
            (log_price + season).exp()
        })
        .collect();

    let series = PriceSeries::from_prices("close", origin, &prices)?;
    println!("Simulated {} daily prices from {} to {}", series.len(), origin, end);

    let mut config = ReportConfig::default();
    config.benchmark.naive = true;
    config.nnetar.repeats = 5;
    config.nnetar.simulation_paths = 200;
    config.prophet.uncertainty_samples = 200;

    let report = run_report_for(&series, &config)?;
    println!("{}", report);

    if let Some(best) = report.accuracy.best() {
        println!("Best model on the test window: {} (RMSE {:.4})", best.model, best.test.rmse);
    }

    Ok(())
}
