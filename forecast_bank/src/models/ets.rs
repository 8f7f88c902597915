//! Exponential smoothing state space models (ETS) with automatic selection

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{normal_intervals, ForecastModel, ForecastResult, TrainedForecastModel};
use serde::{Deserialize, Serialize};
use series_math::{nelder_mead, NelderMeadConfig};
use std::fmt;
use tracing::debug;

/// Seasonal periods above this are fitted without a seasonal component
pub const MAX_SEASONAL_PERIOD: usize = 24;

/// Search space and estimation settings for [`AutoEts`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtsConfig {
    /// Seasonal period of the data (daily data uses 365)
    pub period: usize,
    /// Consider multiplicative errors (requires strictly positive data)
    pub allow_multiplicative_error: bool,
    /// Consider damped trends
    pub allow_damped: bool,
    /// Optimiser settings for the likelihood
    pub optimizer: NelderMeadConfig,
}

impl Default for EtsConfig {
    fn default() -> Self {
        Self {
            period: 365,
            allow_multiplicative_error: true,
            allow_damped: true,
            optimizer: NelderMeadConfig::default(),
        }
    }
}

/// Error component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorType {
    Additive,
    Multiplicative,
}

/// Trend component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendType {
    None,
    Additive,
    Damped,
}

/// Seasonal component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeasonalType {
    None,
    Additive,
}

/// ETS component specification, e.g. `ETS(A,Ad,N)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EtsSpec {
    pub error: ErrorType,
    pub trend: TrendType,
    pub season: SeasonalType,
}

impl fmt::Display for EtsSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error = match self.error {
            ErrorType::Additive => "A",
            ErrorType::Multiplicative => "M",
        };
        let trend = match self.trend {
            TrendType::None => "N",
            TrendType::Additive => "A",
            TrendType::Damped => "Ad",
        };
        let season = match self.season {
            SeasonalType::None => "N",
            SeasonalType::Additive => "A",
        };
        write!(f, "ETS({},{},{})", error, trend, season)
    }
}

/// Smoothing parameters and initial states
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EtsParameters {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub phi: f64,
    pub level: f64,
    pub trend: f64,
}

/// ETS model with automatic component selection by AICc
#[derive(Debug, Clone)]
pub struct AutoEts {
    name: String,
    config: EtsConfig,
}

/// Trained ETS model
#[derive(Debug, Clone)]
pub struct TrainedEts {
    name: String,
    spec: EtsSpec,
    params: EtsParameters,
    period: usize,
    /// Final level
    level: f64,
    /// Final trend
    trend: f64,
    /// Last `period` seasonal states, oldest first
    seasonals: Vec<f64>,
    /// Variance of the (relative, for multiplicative errors) innovations
    sigma2: f64,
    aicc: f64,
    fitted: Vec<f64>,
}

struct FilterOutput {
    fitted: Vec<f64>,
    errors: Vec<f64>,
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
}

impl AutoEts {
    /// Create an automatic ETS with the default search space
    pub fn new() -> Self {
        Self::with_config(EtsConfig::default())
    }

    /// Create an automatic ETS with a custom search space
    pub fn with_config(config: EtsConfig) -> Self {
        Self {
            name: "ETS".to_string(),
            config,
        }
    }

    fn candidates(&self, positive: bool) -> Vec<EtsSpec> {
        let mut errors = vec![ErrorType::Additive];
        if self.config.allow_multiplicative_error && positive {
            errors.push(ErrorType::Multiplicative);
        }
        let mut trends = vec![TrendType::None, TrendType::Additive];
        if self.config.allow_damped {
            trends.push(TrendType::Damped);
        }
        let mut seasons = vec![SeasonalType::None];
        if self.config.period > 1 && self.config.period <= MAX_SEASONAL_PERIOD {
            seasons.push(SeasonalType::Additive);
        }

        let mut specs = Vec::new();
        for &error in &errors {
            for &trend in &trends {
                for &season in &seasons {
                    specs.push(EtsSpec {
                        error,
                        trend,
                        season,
                    });
                }
            }
        }
        specs
    }
}

impl Default for AutoEts {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastModel for AutoEts {
    type Trained = TrainedEts;

    fn train(&self, data: &PriceSeries) -> Result<TrainedEts> {
        let values = data.values();
        if values.len() < 10 {
            return Err(ForecastError::ValidationError(
                "ETS needs at least 10 observations".to_string(),
            ));
        }

        let positive = values.iter().all(|v| *v > 0.0);
        let mut best: Option<TrainedEts> = None;

        for spec in self.candidates(positive) {
            match fit_spec(values, spec, self.config.period, &self.config.optimizer) {
                Ok(model) => {
                    debug!(spec = %spec, aicc = model.aicc, "fitted ETS candidate");
                    if best.as_ref().map_or(true, |b| model.aicc < b.aicc) {
                        best = Some(model);
                    }
                }
                Err(e) => debug!(spec = %spec, error = %e, "ETS candidate failed"),
            }
        }

        let model = best.ok_or_else(|| {
            ForecastError::ForecastingError("No ETS model could be fitted".to_string())
        })?;
        debug!(model = %model.spec, "ETS selection finished");
        Ok(model)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fit one ETS specification by maximum likelihood
pub fn fit_spec(
    values: &[f64],
    spec: EtsSpec,
    period: usize,
    optimizer: &NelderMeadConfig,
) -> Result<TrainedEts> {
    let m = match spec.season {
        SeasonalType::None => 1,
        SeasonalType::Additive => period,
    };
    if spec.season == SeasonalType::Additive && values.len() < 2 * m {
        return Err(ForecastError::ValidationError(format!(
            "Seasonal ETS needs two full periods ({} observations)",
            2 * m
        )));
    }
    if spec.error == ErrorType::Multiplicative && values.iter().any(|v| *v <= 0.0) {
        return Err(ForecastError::ValidationError(
            "Multiplicative errors need strictly positive data".to_string(),
        ));
    }

    let (level0, trend0, seasonals0) = initial_states(values, spec, m);
    let has_trend = spec.trend != TrendType::None;
    let damped = spec.trend == TrendType::Damped;
    let seasonal = spec.season == SeasonalType::Additive;

    // Parameter vector: alpha, [beta], [gamma], [phi], level, [trend]
    let mut initial = vec![0.5];
    let mut bounds = vec![(1e-4, 0.9999)];
    if has_trend {
        initial.push(0.05);
        bounds.push((1e-4, 0.9999));
    }
    if seasonal {
        initial.push(0.05);
        bounds.push((1e-4, 0.9999));
    }
    if damped {
        initial.push(0.95);
        bounds.push((0.8, 0.98));
    }
    initial.push(level0);
    bounds.push((f64::NEG_INFINITY, f64::INFINITY));
    if has_trend {
        initial.push(trend0);
        bounds.push((f64::NEG_INFINITY, f64::INFINITY));
    }

    let unpack = |x: &[f64]| -> EtsParameters {
        let mut i = 0;
        let mut next = || {
            let v = x[i];
            i += 1;
            v
        };
        let alpha = next();
        let beta = if has_trend { next() } else { 0.0 };
        let gamma = if seasonal { next() } else { 0.0 };
        let phi = if damped { next() } else { 1.0 };
        let level = next();
        let trend = if has_trend { next() } else { 0.0 };
        EtsParameters {
            alpha,
            beta,
            gamma,
            phi,
            level,
            trend,
        }
    };

    let objective = |x: &[f64]| {
        let params = unpack(x);
        if params.beta > params.alpha || params.gamma > 1.0 - params.alpha {
            return f64::INFINITY;
        }
        let out = filter(values, spec, &params, &seasonals0);
        neg_log_likelihood(spec, &out)
    };

    let result = nelder_mead(objective, &initial, Some(&bounds), optimizer);
    let params = unpack(&result.point);
    let out = filter(values, spec, &params, &seasonals0);
    let lik = neg_log_likelihood(spec, &out);
    if !lik.is_finite() {
        return Err(ForecastError::ForecastingError(format!(
            "{} likelihood did not converge",
            spec
        )));
    }

    let n = values.len() as f64;
    let seasonal_states = if seasonal { m - 1 } else { 0 };
    let k = (initial.len() + seasonal_states + 1) as f64;
    let aic = lik + 2.0 * k;
    let aicc = aic + 2.0 * k * (k + 1.0) / (n - k - 1.0);
    let sigma2 = out.errors.iter().map(|e| e * e).sum::<f64>() / (n - k).max(1.0);

    Ok(TrainedEts {
        name: spec.to_string(),
        spec,
        params,
        period: m,
        level: out.level,
        trend: out.trend,
        seasonals: out.seasonals,
        sigma2,
        aicc,
        fitted: out.fitted,
    })
}

/// Heuristic starting states from the first observations
fn initial_states(values: &[f64], spec: EtsSpec, m: usize) -> (f64, f64, Vec<f64>) {
    let seasonals = if spec.season == SeasonalType::Additive {
        let first_mean = values[..m].iter().sum::<f64>() / m as f64;
        let second_mean = values[m..2 * m].iter().sum::<f64>() / m as f64;
        let slope = (second_mean - first_mean) / m as f64;
        let centre = (m as f64 - 1.0) / 2.0;
        let mut s: Vec<f64> = (0..m)
            .map(|i| {
                let trend_at = first_mean + slope * (i as f64 - centre);
                let next = values[i + m] - (trend_at + slope * m as f64);
                ((values[i] - trend_at) + next) / 2.0
            })
            .collect();
        let mean_s = s.iter().sum::<f64>() / m as f64;
        s.iter_mut().for_each(|v| *v -= mean_s);
        s
    } else {
        vec![0.0]
    };

    let window = values.len().min((2 * m).max(10));
    let adjusted: Vec<f64> = values[..window]
        .iter()
        .enumerate()
        .map(|(i, v)| v - seasonals[i % seasonals.len()])
        .collect();
    let xs: Vec<f64> = (1..=window).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / window as f64;
    let y_mean = adjusted.iter().sum::<f64>() / window as f64;
    let sxy: f64 = xs
        .iter()
        .zip(&adjusted)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    if spec.trend == TrendType::None {
        (adjusted[0], 0.0, seasonals)
    } else {
        (y_mean - slope * x_mean, slope, seasonals)
    }
}

/// Run the state space recursions over the data
fn filter(
    values: &[f64],
    spec: EtsSpec,
    params: &EtsParameters,
    seasonals0: &[f64],
) -> FilterOutput {
    let m = seasonals0.len();
    let mut level = params.level;
    let mut trend = params.trend;
    let mut seasonals = seasonals0.to_vec();
    let mut fitted = Vec::with_capacity(values.len());
    let mut errors = Vec::with_capacity(values.len());

    for (t, &y) in values.iter().enumerate() {
        let s_idx = t % m;
        let season = if spec.season == SeasonalType::Additive {
            seasonals[s_idx]
        } else {
            0.0
        };
        let damped_trend = params.phi * trend;
        let mu = level + damped_trend + season;
        let raw_error = y - mu;

        fitted.push(mu);
        errors.push(match spec.error {
            ErrorType::Additive => raw_error,
            ErrorType::Multiplicative => raw_error / mu,
        });

        // Both error types share these updates when trend and season are additive.
        level = level + damped_trend + params.alpha * raw_error;
        if spec.trend != TrendType::None {
            trend = damped_trend + params.beta * raw_error;
        }
        if spec.season == SeasonalType::Additive {
            seasonals[s_idx] = season + params.gamma * raw_error;
        }
    }

    // Rotate so the state due next comes first.
    let offset = values.len() % m;
    seasonals.rotate_left(offset);

    FilterOutput {
        fitted,
        errors,
        level,
        trend,
        seasonals,
    }
}

/// Twice the negative log likelihood, up to a constant
fn neg_log_likelihood(spec: EtsSpec, out: &FilterOutput) -> f64 {
    let n = out.errors.len() as f64;
    let sse: f64 = out.errors.iter().map(|e| e * e).sum();
    let base = n * sse.ln();
    match spec.error {
        ErrorType::Additive => base,
        ErrorType::Multiplicative => {
            base + 2.0 * out.fitted.iter().map(|mu| mu.abs().ln()).sum::<f64>()
        }
    }
}

impl TrainedEts {
    /// Selected components
    pub fn spec(&self) -> EtsSpec {
        self.spec
    }

    /// Fitted parameters
    pub fn parameters(&self) -> EtsParameters {
        self.params
    }

    /// Corrected Akaike information criterion
    pub fn aicc(&self) -> f64 {
        self.aicc
    }
}

impl TrainedForecastModel for TrainedEts {
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        let EtsParameters {
            alpha,
            beta,
            gamma,
            phi,
            ..
        } = self.params;
        let seasonal = self.spec.season == SeasonalType::Additive;

        let mut values = Vec::with_capacity(horizon);
        let mut std_errors = Vec::with_capacity(horizon);
        let mut trend_multiplier = 0.0;
        let mut phi_power = 1.0;
        let mut variance_sum = 0.0;

        for h in 1..=horizon {
            phi_power *= phi;
            trend_multiplier += phi_power;
            let season = if seasonal {
                self.seasonals[(h - 1) % self.period]
            } else {
                0.0
            };
            let trend_part = if self.spec.trend == TrendType::None {
                0.0
            } else {
                trend_multiplier * self.trend
            };
            let point = self.level + trend_part + season;
            values.push(point);

            let scale = match self.spec.error {
                ErrorType::Additive => 1.0,
                ErrorType::Multiplicative => point * point,
            };
            std_errors.push((self.sigma2 * scale * (1.0 + variance_sum)).sqrt());

            let mut c = alpha;
            if self.spec.trend != TrendType::None {
                c += beta * trend_multiplier;
            }
            if seasonal && h % self.period == 0 {
                c += gamma;
            }
            variance_sum += c * c;
        }

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
        let p = &self.params;
        let mut out = format!("{}; alpha = {:.4}", self.name, p.alpha);
        if self.spec.trend != TrendType::None {
            out.push_str(&format!("; beta = {:.4}", p.beta));
        }
        if self.spec.trend == TrendType::Damped {
            out.push_str(&format!("; phi = {:.4}", p.phi));
        }
        if self.spec.season != SeasonalType::None {
            out.push_str(&format!("; gamma = {:.4}", p.gamma));
        }
        out.push_str(&format!("; AICc = {:.2}", self.aicc));
        out
    }
}
