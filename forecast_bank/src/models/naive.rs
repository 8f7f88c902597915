//! Random-walk benchmark

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{normal_intervals, ForecastModel, ForecastResult, TrainedForecastModel};

/// Naive forecast: every future value equals the last observation
#[derive(Debug, Clone)]
pub struct Naive {
    name: String,
}

/// Trained naive model
#[derive(Debug, Clone)]
pub struct TrainedNaive {
    name: String,
    last_value: f64,
    sigma: f64,
    fitted: Vec<f64>,
}

impl Naive {
    /// Create a new naive model
    pub fn new() -> Self {
        Self {
            name: "Naive".to_string(),
        }
    }
}

impl Default for Naive {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastModel for Naive {
    type Trained = TrainedNaive;

    fn train(&self, data: &PriceSeries) -> Result<TrainedNaive> {
        let values = data.values();
        let last_value = *values.last().ok_or_else(|| {
            ForecastError::DataError("Empty time series data".to_string())
        })?;

        let mut fitted = Vec::with_capacity(values.len());
        fitted.push(f64::NAN);
        fitted.extend_from_slice(&values[..values.len() - 1]);

        let steps = values.len().saturating_sub(1).max(1) as f64;
        let sigma = (values
            .windows(2)
            .map(|w| (w[1] - w[0]).powi(2))
            .sum::<f64>()
            / steps)
            .sqrt();

        Ok(TrainedNaive {
            name: self.name.clone(),
            last_value,
            sigma,
            fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedForecastModel for TrainedNaive {
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        let values = vec![self.last_value; horizon];
        let std_errors: Vec<f64> = (1..=horizon)
            .map(|h| self.sigma * (h as f64).sqrt())
            .collect();
        let intervals = normal_intervals(&values, &std_errors, levels)?;

        ForecastResult::new_with_intervals(values, horizon, intervals)
    }

    fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    fn name(&self) -> &str {
        &self.name
    }
}
