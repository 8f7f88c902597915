//! Holt-Winters smoothing with additive seasonality

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{normal_intervals, ForecastModel, ForecastResult, TrainedForecastModel};
use serde::{Deserialize, Serialize};
use series_math::{nelder_mead, NelderMeadConfig};
use tracing::debug;

/// Settings for [`HoltWinters`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoltWintersConfig {
    /// Seasonal period in observations
    pub period: usize,
    /// Optimiser settings for the one-step SSE
    pub optimizer: NelderMeadConfig,
}

impl Default for HoltWintersConfig {
    fn default() -> Self {
        Self {
            period: 365,
            optimizer: NelderMeadConfig::default(),
        }
    }
}

/// Level + trend + additive seasonal smoothing
#[derive(Debug, Clone)]
pub struct HoltWinters {
    name: String,
    config: HoltWintersConfig,
}

/// Trained Holt-Winters model
#[derive(Debug, Clone)]
pub struct TrainedHoltWinters {
    name: String,
    alpha: f64,
    beta: f64,
    gamma: f64,
    period: usize,
    level: f64,
    trend: f64,
    /// Seasonal states, the one due next first
    seasonals: Vec<f64>,
    sse: f64,
    residual_variance: f64,
    fitted: Vec<f64>,
}

struct SmoothingPass {
    fitted: Vec<f64>,
    sse: f64,
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
}

impl HoltWinters {
    /// Create a Holt-Winters model with the given seasonal period
    pub fn new(period: usize) -> Result<Self> {
        Self::with_config(HoltWintersConfig {
            period,
            ..Default::default()
        })
    }

    /// Create a Holt-Winters model from a full configuration
    pub fn with_config(config: HoltWintersConfig) -> Result<Self> {
        if config.period < 2 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal period must be at least 2".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Holt-Winters (additive, period={})", config.period),
            config,
        })
    }
}

impl ForecastModel for HoltWinters {
    type Trained = TrainedHoltWinters;

    fn train(&self, data: &PriceSeries) -> Result<TrainedHoltWinters> {
        let values = data.values();
        let m = self.config.period;
        if values.len() < 2 * m + 1 {
            return Err(ForecastError::ValidationError(format!(
                "Insufficient data for Holt-Winters. Need more than two periods ({} observations).",
                2 * m
            )));
        }

        let (level0, trend0, seasonals0) = start_values(values, m);

        let bounds = [(0.0, 1.0); 3];
        let result = nelder_mead(
            |x| smooth(values, x[0], x[1], x[2], level0, trend0, &seasonals0).sse,
            &[0.3, 0.1, 0.1],
            Some(&bounds),
            &self.config.optimizer,
        );
        let (alpha, beta, gamma) = (result.point[0], result.point[1], result.point[2]);
        debug!(alpha, beta, gamma, converged = result.converged, "Holt-Winters parameters");

        let pass = smooth(values, alpha, beta, gamma, level0, trend0, &seasonals0);
        if !pass.sse.is_finite() {
            return Err(ForecastError::ForecastingError(
                "Holt-Winters smoothing diverged".to_string(),
            ));
        }

        let residual_variance = pass.sse / values.len() as f64;

        Ok(TrainedHoltWinters {
            name: self.name.clone(),
            alpha,
            beta,
            gamma,
            period: m,
            level: pass.level,
            trend: pass.trend,
            seasonals: pass.seasonals,
            sse: pass.sse,
            residual_variance,
            fitted: pass.fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Level, trend and seasonal figures from the first two periods.
///
/// The level and trend refer to the step before the first observation.
fn start_values(values: &[f64], m: usize) -> (f64, f64, Vec<f64>) {
    let first_mean = values[..m].iter().sum::<f64>() / m as f64;
    let second_mean = values[m..2 * m].iter().sum::<f64>() / m as f64;
    let slope = (second_mean - first_mean) / m as f64;
    let centre = (m as f64 - 1.0) / 2.0;

    let mut seasonals: Vec<f64> = (0..m)
        .map(|i| {
            let trend_first = first_mean + slope * (i as f64 - centre);
            let trend_second = trend_first + slope * m as f64;
            ((values[i] - trend_first) + (values[i + m] - trend_second)) / 2.0
        })
        .collect();
    let mean_season = seasonals.iter().sum::<f64>() / m as f64;
    seasonals.iter_mut().for_each(|s| *s -= mean_season);

    let level0 = first_mean - slope * (centre + 1.0);
    (level0, slope, seasonals)
}

fn smooth(
    values: &[f64],
    alpha: f64,
    beta: f64,
    gamma: f64,
    level0: f64,
    trend0: f64,
    seasonals0: &[f64],
) -> SmoothingPass {
    let m = seasonals0.len();
    let mut level = level0;
    let mut trend = trend0;
    let mut seasonals = seasonals0.to_vec();
    let mut fitted = Vec::with_capacity(values.len());
    let mut sse = 0.0;

    for (t, &y) in values.iter().enumerate() {
        let idx = t % m;
        let prediction = level + trend + seasonals[idx];
        fitted.push(prediction);
        sse += (y - prediction).powi(2);

        let previous_level = level;
        level = alpha * (y - seasonals[idx]) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * trend;
        seasonals[idx] = gamma * (y - level) + (1.0 - gamma) * seasonals[idx];
    }

    seasonals.rotate_left(values.len() % m);

    SmoothingPass {
        fitted,
        sse,
        level,
        trend,
        seasonals,
    }
}

impl TrainedHoltWinters {
    /// Smoothing parameters `(alpha, beta, gamma)`
    pub fn parameters(&self) -> (f64, f64, f64) {
        (self.alpha, self.beta, self.gamma)
    }

    /// Sum of squared one-step errors on the training data
    pub fn sse(&self) -> f64 {
        self.sse
    }
}

impl TrainedForecastModel for TrainedHoltWinters {
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        let m = self.period;
        let values: Vec<f64> = (1..=horizon)
            .map(|h| self.level + h as f64 * self.trend + self.seasonals[(h - 1) % m])
            .collect();

        let mut psi_sum = 0.0;
        let std_errors: Vec<f64> = (1..=horizon)
            .map(|h| {
                let se = (self.residual_variance * (1.0 + psi_sum)).sqrt();
                let j = h as f64;
                let seasonal_term = if h % m == 0 {
                    self.gamma * (1.0 - self.alpha)
                } else {
                    0.0
                };
                let psi = self.alpha * (1.0 + j * self.beta) + seasonal_term;
                psi_sum += psi * psi;
                se
            })
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

    fn specification(&self) -> String {
        format!(
            "{}; alpha = {:.4}; beta = {:.4}; gamma = {:.4}; SSE = {:.4}",
            self.name, self.alpha, self.beta, self.gamma, self.sse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_start_values_recover_pattern() {
        let pattern = [1.0, -1.0, 2.0, -2.0];
        let values: Vec<f64> = (0..8).map(|i| 10.0 + pattern[i % 4]).collect();
        let (level, trend, seasonals) = start_values(&values, 4);
        assert_abs_diff_eq!(trend, 0.0);
        assert_abs_diff_eq!(level, 10.0);
        for (s, p) in seasonals.iter().zip(pattern) {
            assert_abs_diff_eq!(*s, p, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_period_validation() {
        assert!(HoltWinters::new(1).is_err());
        assert!(HoltWinters::new(7).is_ok());
    }
}
