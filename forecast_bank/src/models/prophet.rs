//! Decomposable trend + seasonality regression in the style of Prophet
//!
//! The series is modelled as a piecewise-linear trend with potential
//! changepoints spread over the early part of the history, plus Fourier
//! seasonalities that either add to the trend or scale it. Time is measured
//! in days from the first observation, so any regular daily calendar works.
//!
//! Estimation is a penalised least squares fit: changepoint slope
//! adjustments are shrunk according to `changepoint_prior_scale` and Fourier
//! coefficients according to `seasonality_prior_scale`. Prediction intervals
//! simulate future changepoints with Laplace-distributed slope changes and
//! add Gaussian observation noise.

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{
    simulated_intervals, validate_levels, ForecastModel, ForecastResult, TrainedForecastModel,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use serde::{Deserialize, Serialize};
use series_math::linalg::ridge_least_squares;
use std::f64::consts::PI;
use tracing::debug;

/// How seasonal terms combine with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    /// `y = trend + seasonal`
    Additive,
    /// `y = trend * (1 + seasonal)`
    Multiplicative,
}

/// One Fourier seasonality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityConfig {
    pub name: String,
    /// Period in days
    pub period: f64,
    /// Number of sine/cosine pairs
    pub order: usize,
}

impl SeasonalityConfig {
    pub fn new(name: &str, period: f64, order: usize) -> Self {
        Self {
            name: name.to_string(),
            period,
            order,
        }
    }
}

/// Settings for [`Prophet`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetConfig {
    /// Number of potential trend changepoints
    pub n_changepoints: usize,
    /// Share of the history in which changepoints may be placed
    pub changepoint_range: f64,
    /// Scale of the Laplace prior on slope changes
    pub changepoint_prior_scale: f64,
    /// Scale of the Gaussian prior on Fourier coefficients
    pub seasonality_prior_scale: f64,
    pub mode: SeasonalityMode,
    /// Simulated trajectories for prediction intervals
    pub uncertainty_samples: usize,
    pub seed: u64,
    pub seasonalities: Vec<SeasonalityConfig>,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            mode: SeasonalityMode::Additive,
            uncertainty_samples: 1000,
            seed: 42,
            seasonalities: vec![
                SeasonalityConfig::new("yearly", 365.25, 10),
                SeasonalityConfig::new("weekly", 7.0, 3),
            ],
        }
    }
}

/// Piecewise-linear trend with Fourier seasonalities
#[derive(Debug, Clone)]
pub struct Prophet {
    name: String,
    config: ProphetConfig,
}

/// Trained trend + seasonality model
#[derive(Debug, Clone)]
pub struct TrainedProphet {
    name: String,
    mode: SeasonalityMode,
    /// Day offset of the last training observation
    last_day: f64,
    /// Days covered by the training data, used to scale time to `[0, 1]`
    span: f64,
    /// Values are divided by this before fitting
    y_scale: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    slope: f64,
    offset: f64,
    deltas: Vec<f64>,
    seasonalities: Vec<SeasonalityConfig>,
    beta: Vec<f64>,
    /// Residual standard deviation on the scaled value axis
    sigma: f64,
    uncertainty_samples: usize,
    seed: u64,
    fitted: Vec<f64>,
}

/// Trend parameters `(offset, slope, deltas)` and Fourier coefficients
struct Components {
    offset: f64,
    slope: f64,
    deltas: Vec<f64>,
    beta: Vec<f64>,
}

impl Prophet {
    /// Create a model with the default yearly and weekly seasonalities
    pub fn new() -> Self {
        Self::with_config(ProphetConfig::default())
    }

    /// Create a model from a configuration
    pub fn with_config(config: ProphetConfig) -> Self {
        Self {
            name: "Prophet".to_string(),
            config,
        }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if !(c.changepoint_range > 0.0 && c.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "changepoint_range must be in (0, 1], got {}",
                c.changepoint_range
            )));
        }
        if !(c.changepoint_prior_scale > 0.0) || !(c.seasonality_prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Prior scales must be positive".to_string(),
            ));
        }
        if let Some(s) = c
            .seasonalities
            .iter()
            .find(|s| !(s.period > 0.0) || s.order == 0)
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonality '{}' needs a positive period and order",
                s.name
            )));
        }
        Ok(())
    }

    /// Changepoints evenly spread over the first `changepoint_range` of history
    fn place_changepoints(&self, t: &[f64]) -> Vec<f64> {
        let history = ((t.len() as f64) * self.config.changepoint_range).floor() as usize;
        let count = self.config.n_changepoints.min(history.saturating_sub(1));
        if count == 0 {
            return Vec::new();
        }
        let last = (history - 1) as f64;
        (1..=count)
            .map(|i| {
                let idx = (i as f64 * last / count as f64).round() as usize;
                t[idx]
            })
            .collect()
    }
}

impl Default for Prophet {
    fn default() -> Self {
        Self::new()
    }
}

fn fourier_row(seasonalities: &[SeasonalityConfig], day: f64) -> Vec<f64> {
    let mut row = Vec::new();
    for s in seasonalities {
        for i in 1..=s.order {
            let angle = 2.0 * PI * i as f64 * day / s.period;
            row.push(angle.sin());
            row.push(angle.cos());
        }
    }
    row
}

fn trend_row(changepoints: &[f64], t: f64) -> Vec<f64> {
    let mut row = Vec::with_capacity(changepoints.len() + 2);
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|s| (t - s).max(0.0)));
    row
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn variance_about_zero(residuals: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = residuals.fold((0.0, 0usize), |(s, n), r| (s + r * r, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl ForecastModel for Prophet {
    type Trained = TrainedProphet;

    fn train(&self, data: &PriceSeries) -> Result<TrainedProphet> {
        self.validate()?;
        let values = data.values();
        let first = data.first_date().ok_or_else(|| {
            ForecastError::DataError("Empty time series data".to_string())
        })?;
        if values.len() < 3 {
            return Err(ForecastError::ValidationError(
                "Prophet needs at least 3 observations".to_string(),
            ));
        }

        let days: Vec<f64> = data
            .dates()
            .iter()
            .map(|d| (*d - first).num_days() as f64)
            .collect();
        let last_day = days[days.len() - 1];
        let span = last_day.max(1.0);
        let t: Vec<f64> = days.iter().map(|d| d / span).collect();

        let y_scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if y_scale == 0.0 {
            return Err(ForecastError::DataError(
                "Series is identically zero".to_string(),
            ));
        }
        let y: Vec<f64> = values.iter().map(|v| v / y_scale).collect();

        // A seasonality needs two full cycles in the history to be estimable.
        let seasonalities: Vec<SeasonalityConfig> = self
            .config
            .seasonalities
            .iter()
            .filter(|s| {
                let keep = last_day >= 2.0 * s.period;
                if !keep {
                    debug!(seasonality = %s.name, "history too short, skipping seasonality");
                }
                keep
            })
            .cloned()
            .collect();

        let changepoints = self.place_changepoints(&t);
        let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(&changepoints, ti)).collect();
        let season_rows: Vec<Vec<f64>> =
            days.iter().map(|&d| fourier_row(&seasonalities, d)).collect();

        let components = match self.config.mode {
            SeasonalityMode::Additive => {
                self.fit_additive(&y, &trend_rows, &season_rows, changepoints.len())?
            }
            SeasonalityMode::Multiplicative => {
                self.fit_multiplicative(&y, &trend_rows, &season_rows, changepoints.len())?
            }
        };

        let mut trained = TrainedProphet {
            name: self.name.clone(),
            mode: self.config.mode,
            last_day,
            span,
            y_scale,
            changepoints,
            slope: components.slope,
            offset: components.offset,
            deltas: components.deltas,
            seasonalities,
            beta: components.beta,
            sigma: 0.0,
            uncertainty_samples: self.config.uncertainty_samples,
            seed: self.config.seed,
            fitted: Vec::with_capacity(values.len()),
        };

        let scaled_fit: Vec<f64> = t
            .iter()
            .zip(&days)
            .map(|(&ti, &d)| trained.predict_scaled(ti, d))
            .collect();
        trained.sigma = variance_about_zero(y.iter().zip(&scaled_fit).map(|(a, b)| a - b)).sqrt();
        trained.fitted = scaled_fit.iter().map(|v| v * y_scale).collect();

        debug!(
            changepoints = trained.changepoints.len(),
            mode = ?trained.mode,
            sigma = trained.sigma,
            "trained Prophet"
        );
        Ok(trained)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Prophet {
    fn penalties(&self, sigma2: f64, n_changepoints: usize, n_fourier: usize) -> Vec<f64> {
        let tau = self.config.changepoint_prior_scale;
        let sigma_beta = self.config.seasonality_prior_scale;
        let mut penalties = vec![0.0, 0.0];
        penalties.extend(std::iter::repeat(sigma2 / (tau * tau)).take(n_changepoints));
        penalties.extend(std::iter::repeat(sigma2 / (sigma_beta * sigma_beta)).take(n_fourier));
        penalties
    }

    fn fit_additive(
        &self,
        y: &[f64],
        trend_rows: &[Vec<f64>],
        season_rows: &[Vec<f64>],
        n_changepoints: usize,
    ) -> Result<Components> {
        let n_fourier = season_rows.first().map_or(0, Vec::len);
        let design: Vec<Vec<f64>> = trend_rows
            .iter()
            .zip(season_rows)
            .map(|(a, b)| a.iter().chain(b).copied().collect())
            .collect();

        // Start from a heavily smoothed fit, then re-weight the priors with
        // the residual variance it leaves.
        let mut sigma2 = variance_about_zero(y.windows(2).map(|w| w[1] - w[0])).max(1e-10);
        let mut coefficients = Vec::new();
        for _ in 0..2 {
            let penalties = self.penalties(sigma2, n_changepoints, n_fourier);
            coefficients = ridge_least_squares(&design, y, &penalties)?;
            sigma2 = variance_about_zero(
                design.iter().zip(y).map(|(row, target)| target - dot(row, &coefficients)),
            )
            .max(1e-10);
        }

        Ok(split_coefficients(&coefficients, n_changepoints))
    }

    fn fit_multiplicative(
        &self,
        y: &[f64],
        trend_rows: &[Vec<f64>],
        season_rows: &[Vec<f64>],
        n_changepoints: usize,
    ) -> Result<Components> {
        let n_fourier = season_rows.first().map_or(0, Vec::len);
        let trend_penalties = self.penalties(1.0, n_changepoints, 0);

        let mut sigma2 = variance_about_zero(y.windows(2).map(|w| w[1] - w[0])).max(1e-10);
        let mut beta = vec![0.0; n_fourier];
        let mut trend_coef = Vec::new();

        for _ in 0..5 {
            // Trend on the deseasonalised values
            let factors: Vec<f64> = season_rows.iter().map(|row| 1.0 + dot(row, &beta)).collect();
            if factors.iter().any(|f| *f <= 0.0) {
                return Err(ForecastError::ForecastingError(
                    "Multiplicative seasonal factor became non-positive".to_string(),
                ));
            }
            let adjusted: Vec<f64> = y.iter().zip(&factors).map(|(v, f)| v / f).collect();
            let penalties: Vec<f64> = trend_penalties.iter().map(|p| p * sigma2).collect();
            trend_coef = ridge_least_squares(trend_rows, &adjusted, &penalties)?;

            // Relative seasonal deviations from that trend
            let trend: Vec<f64> = trend_rows.iter().map(|row| dot(row, &trend_coef)).collect();
            if trend.iter().any(|v| *v <= 0.0) {
                return Err(ForecastError::ForecastingError(
                    "Multiplicative seasonality needs a positive trend".to_string(),
                ));
            }
            if n_fourier > 0 {
                let relative: Vec<f64> = y.iter().zip(&trend).map(|(v, tr)| v / tr - 1.0).collect();
                let penalties = self.penalties(sigma2, 0, n_fourier);
                beta = ridge_least_squares(season_rows, &relative, &penalties[2..])?;
            }

            sigma2 = variance_about_zero(
                y.iter()
                    .zip(&trend)
                    .zip(season_rows)
                    .map(|((v, tr), row)| v - tr * (1.0 + dot(row, &beta))),
            )
            .max(1e-10);
        }

        let mut components = split_coefficients(&trend_coef, n_changepoints);
        components.beta = beta;
        Ok(components)
    }
}

fn split_coefficients(coefficients: &[f64], n_changepoints: usize) -> Components {
    Components {
        offset: coefficients[0],
        slope: coefficients[1],
        deltas: coefficients[2..2 + n_changepoints].to_vec(),
        beta: coefficients[2 + n_changepoints..].to_vec(),
    }
}

impl TrainedProphet {
    /// Seasonality mode the model was fitted with
    pub fn mode(&self) -> SeasonalityMode {
        self.mode
    }

    /// Number of changepoints in the trend
    pub fn changepoint_count(&self) -> usize {
        self.changepoints.len()
    }

    /// Fitted slope adjustments at each changepoint, on the scaled axes
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    fn trend(&self, t: f64) -> f64 {
        self.offset
            + self.slope * t
            + self
                .changepoints
                .iter()
                .zip(&self.deltas)
                .map(|(s, d)| d * (t - s).max(0.0))
                .sum::<f64>()
    }

    fn seasonal(&self, day: f64) -> f64 {
        dot(&fourier_row(&self.seasonalities, day), &self.beta)
    }

    fn combine(&self, trend: f64, seasonal: f64) -> f64 {
        match self.mode {
            SeasonalityMode::Additive => trend + seasonal,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        }
    }

    fn predict_scaled(&self, t: f64, day: f64) -> f64 {
        self.combine(self.trend(t), self.seasonal(day))
    }

    /// Trend trajectories with simulated future changepoints
    fn sample_paths(&self, days: &[f64], t: &[f64]) -> Result<Vec<Vec<f64>>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.sigma)
            .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;

        let t_end = t.last().copied().unwrap_or(1.0);
        let future_span = (t_end - 1.0).max(0.0);
        let rate = self.changepoints.len() as f64 * future_span;
        let mean_abs_delta = if self.deltas.is_empty() {
            0.0
        } else {
            self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64
        } + 1e-8;
        let laplace = Exp::new(1.0 / mean_abs_delta)
            .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
        let poisson = if rate > 0.0 {
            Some(
                Poisson::new(rate)
                    .map_err(|e| ForecastError::ForecastingError(e.to_string()))?,
            )
        } else {
            None
        };

        let seasonal: Vec<f64> = days.iter().map(|&d| self.seasonal(d)).collect();
        let mut paths = Vec::with_capacity(self.uncertainty_samples);
        for _ in 0..self.uncertainty_samples {
            let count = poisson.as_ref().map_or(0, |p| p.sample(&mut rng) as usize);
            let changes: Vec<(f64, f64)> = (0..count)
                .map(|_| {
                    let at = rng.gen_range(1.0..=t_end);
                    let magnitude = laplace.sample(&mut rng);
                    let delta = if rng.gen::<bool>() { magnitude } else { -magnitude };
                    (at, delta)
                })
                .collect();

            let path = t
                .iter()
                .zip(&seasonal)
                .map(|(&ti, &s)| {
                    let extra: f64 = changes.iter().map(|(at, d)| d * (ti - at).max(0.0)).sum();
                    let value = self.combine(self.trend(ti) + extra, s) + noise.sample(&mut rng);
                    value * self.y_scale
                })
                .collect();
            paths.push(path);
        }
        Ok(paths)
    }
}

impl TrainedForecastModel for TrainedProphet {
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        validate_levels(levels)?;
        let days: Vec<f64> = (1..=horizon).map(|h| self.last_day + h as f64).collect();
        let t: Vec<f64> = days.iter().map(|d| d / self.span).collect();

        let values: Vec<f64> = t
            .iter()
            .zip(&days)
            .map(|(&ti, &d)| self.predict_scaled(ti, d) * self.y_scale)
            .collect();

        if levels.is_empty() || self.uncertainty_samples == 0 || horizon == 0 {
            return ForecastResult::new(values, horizon);
        }

        let paths = self.sample_paths(&days, &t)?;
        let intervals = simulated_intervals(&paths, horizon, levels)?;
        ForecastResult::new_with_intervals(values, horizon, intervals)
    }

    fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn specification(&self) -> String {
        let seasonalities: Vec<String> = self
            .seasonalities
            .iter()
            .map(|s| format!("{}({}, {})", s.name, s.period, s.order))
            .collect();
        format!(
            "{}; {:?} seasonality [{}]; {} changepoints; base slope = {:.4}",
            self.name,
            self.mode,
            seasonalities.join(", "),
            self.changepoints.len(),
            self.slope * self.y_scale / self.span
        )
    }
}
