//! Forecasting models for daily series

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::{Data, OrderStatistics};
use std::fmt::{self, Debug};

/// Default prediction interval levels, in percent
pub const DEFAULT_LEVELS: [f64; 2] = [80.0, 95.0];

/// Lower and upper bounds at one coverage level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionInterval {
    /// Nominal coverage in percent
    pub level: f64,
    /// Lower bound per horizon step
    pub lower: Vec<f64>,
    /// Upper bound per horizon step
    pub upper: Vec<f64>,
}

/// Forecast result containing predicted values
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    /// Forecasted values
    pub(crate) values: Vec<f64>,
    /// Number of periods forecasted
    horizons: usize,
    /// Prediction intervals, one entry per level
    pub(crate) intervals: Vec<PredictionInterval>,
    /// Dates the values refer to (optional)
    pub(crate) timestamps: Option<Vec<NaiveDate>>,
    /// In-sample one-step fitted values of the model that produced it
    #[serde(skip)]
    pub(crate) fitted: Vec<f64>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(values: Vec<f64>, horizons: usize) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        Ok(Self {
            values,
            horizons,
            intervals: Vec::new(),
            timestamps: None,
            fitted: Vec::new(),
        })
    }

    /// Create a new forecast result with prediction intervals
    pub fn new_with_intervals(
        values: Vec<f64>,
        horizons: usize,
        intervals: Vec<PredictionInterval>,
    ) -> Result<Self> {
        let mut result = Self::new(values, horizons)?;

        for interval in &intervals {
            if interval.lower.len() != horizons || interval.upper.len() != horizons {
                return Err(ForecastError::ValidationError(format!(
                    "Interval at {}% doesn't cover {} horizons",
                    interval.level, horizons
                )));
            }
        }

        result.intervals = intervals;
        Ok(result)
    }

    /// Attach the dates the forecast refers to
    pub fn with_timestamps(mut self, timestamps: Vec<NaiveDate>) -> Result<Self> {
        if timestamps.len() != self.horizons {
            return Err(ForecastError::ValidationError(format!(
                "Timestamps length ({}) doesn't match horizons ({})",
                timestamps.len(),
                self.horizons
            )));
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    /// Attach the in-sample fitted values
    pub fn with_fitted(mut self, fitted: Vec<f64>) -> Self {
        self.fitted = fitted;
        self
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    /// Get the prediction intervals (empty when the model gives none)
    pub fn intervals(&self) -> &[PredictionInterval] {
        &self.intervals
    }

    /// Interval at a given level, if available
    pub fn interval(&self, level: f64) -> Option<&PredictionInterval> {
        self.intervals
            .iter()
            .find(|i| (i.level - level).abs() < 1e-9)
    }

    /// Get the timestamps, if available
    pub fn timestamps(&self) -> Option<&[NaiveDate]> {
        self.timestamps.as_deref()
    }

    /// In-sample fitted values (empty when not attached)
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast `horizon` steps with intervals at the given levels (percent)
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult>;

    /// Forecast `horizon` steps with the default 80% and 95% intervals
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        self.forecast_with_levels(horizon, &DEFAULT_LEVELS)
    }

    /// One-step-ahead fitted values over the training window.
    ///
    /// Aligned with the training data; NaN where the model has no fit.
    fn fitted_values(&self) -> &[f64];

    /// Name of the model
    fn name(&self) -> &str;

    /// Human readable description of the fitted specification
    fn specification(&self) -> String {
        self.name().to_string()
    }
}

/// Forecast model that can be trained on a daily series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a series
    fn train(&self, data: &PriceSeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// The procedures the model bank can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Arima,
    Ets,
    HoltWinters,
    Nnetar,
    Prophet,
    Naive,
    Combination,
}

impl ModelKind {
    /// Short label used in tables
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Arima => "ARIMA",
            ModelKind::Ets => "ETS",
            ModelKind::HoltWinters => "Holt-Winters",
            ModelKind::Nnetar => "NNETAR",
            ModelKind::Prophet => "Prophet",
            ModelKind::Naive => "Naive",
            ModelKind::Combination => "Combination",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Check that every level lies strictly between 0 and 100 percent
pub fn validate_levels(levels: &[f64]) -> Result<()> {
    match levels.iter().find(|l| !(**l > 0.0 && **l < 100.0)) {
        Some(level) => Err(ForecastError::InvalidParameter(format!(
            "Interval level must be between 0 and 100, got {}",
            level
        ))),
        None => Ok(()),
    }
}

/// Symmetric Gaussian intervals from point forecasts and standard errors
pub fn normal_intervals(
    values: &[f64],
    std_errors: &[f64],
    levels: &[f64],
) -> Result<Vec<PredictionInterval>> {
    validate_levels(levels)?;
    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;

    Ok(levels
        .iter()
        .map(|&level| {
            let z = standard.inverse_cdf(0.5 + level / 200.0);
            let (lower, upper) = values
                .iter()
                .zip(std_errors)
                .map(|(v, se)| (v - z * se, v + z * se))
                .unzip();
            PredictionInterval {
                level,
                lower,
                upper,
            }
        })
        .collect())
}

/// Empirical intervals from simulated sample paths.
///
/// `paths[i][h]` is the value of path `i` at step `h`.
pub fn simulated_intervals(
    paths: &[Vec<f64>],
    horizon: usize,
    levels: &[f64],
) -> Result<Vec<PredictionInterval>> {
    validate_levels(levels)?;
    if paths.is_empty() {
        return Err(ForecastError::ForecastingError(
            "No simulated paths to derive intervals from".to_string(),
        ));
    }

    let mut intervals: Vec<PredictionInterval> = levels
        .iter()
        .map(|&level| PredictionInterval {
            level,
            lower: Vec::with_capacity(horizon),
            upper: Vec::with_capacity(horizon),
        })
        .collect();

    for h in 0..horizon {
        let mut column = Data::new(paths.iter().map(|p| p[h]).collect::<Vec<f64>>());
        for interval in intervals.iter_mut() {
            let tail = (1.0 - interval.level / 100.0) / 2.0;
            interval.lower.push(column.quantile(tail));
            interval.upper.push(column.quantile(1.0 - tail));
        }
    }

    Ok(intervals)
}

pub mod arima;
pub mod combination;
pub mod ets;
pub mod holt_winters;
pub mod naive;
pub mod nnetar;
pub mod prophet;
