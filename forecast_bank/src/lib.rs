//! # Forecast Bank
//!
//! Fit, compare and combine forecasting models on a daily log-price series.
//!
//! ## Features
//!
//! - Daily series loading from CSV (date and price columns, log transform)
//! - Calendar train/test split at a configurable cutoff
//! - Automatic ARIMA and ETS selection by AICc
//! - Holt-Winters with additive seasonality
//! - Autoregressive neural network (NNETAR) with simulated intervals
//! - Prophet-style piecewise trend with Fourier seasonality
//! - Equal-weight forecast combination
//! - Training and test accuracy ranked by test RMSE
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_bank::config::ReportConfig;
//! use forecast_bank::report::run_report;
//!
//! let mut config = ReportConfig::default();
//! config.data.path = Some("eth_prices.csv".into());
//!
//! let report = run_report(&config)?;
//! println!("{}", report);
//! # Ok::<(), forecast_bank::ForecastError>(())
//! ```
//!
//! Individual models can be used directly:
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use forecast_bank::data::PriceSeries;
//! use forecast_bank::models::arima::AutoArima;
//! use forecast_bank::models::{ForecastModel, TrainedForecastModel};
//!
//! let origin = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let prices: Vec<f64> = (0..400).map(|i| 100.0 + i as f64 * 0.5).collect();
//! let series = PriceSeries::from_prices("close", origin, &prices)?;
//!
//! let trained = AutoArima::new().train(&series)?;
//! let forecast = trained.forecast(30)?;
//! println!("{}: {:?}", trained.name(), forecast.values());
//! # Ok::<(), forecast_bank::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod report;
pub mod split;

// Re-export commonly used types
pub use config::ReportConfig;
pub use data::{DataLoader, PriceSeries};
pub use error::{ForecastError, Result};
pub use metrics::{evaluate_model, AccuracyReport, ErrorMetrics, ModelAccuracy};
pub use models::combination::ForecastCombination;
pub use models::{ForecastModel, ForecastResult, ModelKind, TrainedForecastModel};
pub use report::{run_report, run_report_for, ModelBank, ReportOutput};
pub use split::TrainTestSplit;
