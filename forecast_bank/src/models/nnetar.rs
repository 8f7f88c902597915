//! Autoregressive feed-forward neural network (NNAR)
//!
//! Lagged values of the series feed a single hidden layer of logistic units
//! with a linear output. Several networks are trained from different random
//! starts and averaged. Prediction intervals come from simulating future
//! sample paths with Gaussian innovations; every random draw is taken from a
//! generator seeded by [`NnetarConfig::seed`], so results are reproducible.

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{
    simulated_intervals, validate_levels, ForecastModel, ForecastResult, TrainedForecastModel,
};
use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use series_math::autocorrelation::ar_order_aic;
use series_math::descriptive::standardize;
use tracing::debug;

/// Settings for [`Nnetar`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NnetarConfig {
    /// Non-seasonal lags; chosen by AIC on a linear AR fit when unset
    pub p: Option<usize>,
    /// Largest AR order considered when choosing `p`
    pub max_p: usize,
    /// Number of seasonal lags (multiples of `period`)
    pub seasonal_lags: usize,
    /// Seasonal period in observations
    pub period: usize,
    /// Hidden units; `round((p + P + 1) / 2)` when unset
    pub hidden: Option<usize>,
    /// Networks trained from different random starts
    pub repeats: usize,
    /// Full-batch training epochs per network
    pub epochs: usize,
    /// Adam step size
    pub learning_rate: f64,
    /// Weight decay penalty
    pub decay: f64,
    /// Simulated paths used for prediction intervals
    pub simulation_paths: usize,
    /// Seed for weight initialisation and simulation
    pub seed: u64,
}

impl Default for NnetarConfig {
    fn default() -> Self {
        Self {
            p: None,
            max_p: 30,
            seasonal_lags: 1,
            period: 365,
            hidden: None,
            repeats: 20,
            epochs: 300,
            learning_rate: 0.01,
            decay: 1e-4,
            simulation_paths: 1000,
            seed: 42,
        }
    }
}

/// Autoregressive neural network forecaster
#[derive(Debug, Clone)]
pub struct Nnetar {
    name: String,
    config: NnetarConfig,
}

/// Trained NNAR model
#[derive(Debug, Clone)]
pub struct TrainedNnetar {
    name: String,
    lags: Vec<usize>,
    networks: Vec<Network>,
    /// Standardisation applied before training
    centre: f64,
    scale: f64,
    /// Standardised training data
    scaled: Vec<f64>,
    /// Residual standard deviation on the standardised scale
    sigma: f64,
    simulation_paths: usize,
    seed: u64,
    fitted: Vec<f64>,
}

/// One hidden-layer network with logistic hidden units and a linear output
#[derive(Debug, Clone)]
struct Network {
    /// Hidden weights, one row per hidden unit
    w_hidden: Array2<f64>,
    b_hidden: Array1<f64>,
    w_out: Array1<f64>,
    b_out: f64,
}

/// Adam hyper-parameters for one update step
struct AdamStep {
    learning_rate: f64,
    decay: f64,
    correction1: f64,
    correction2: f64,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPS: f64 = 1e-8;

impl AdamStep {
    fn update(&self, w: &mut f64, g: f64, first: &mut f64, second: &mut f64) {
        let g = g + 2.0 * self.decay * *w;
        *first = BETA1 * *first + (1.0 - BETA1) * g;
        *second = BETA2 * *second + (1.0 - BETA2) * g * g;
        let m_hat = *first / self.correction1;
        let v_hat = *second / self.correction2;
        *w -= self.learning_rate * m_hat / (v_hat.sqrt() + EPS);
    }
}

/// First and second moment estimates for one parameter array
struct Moments<D: Dimension> {
    first: Array<f64, D>,
    second: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            first: Array::zeros(param.raw_dim()),
            second: Array::zeros(param.raw_dim()),
        }
    }

    fn apply(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, step: &AdamStep) {
        Zip::from(param)
            .and(grad)
            .and(&mut self.first)
            .and(&mut self.second)
            .for_each(|w, &g, m, v| step.update(w, g, m, v));
    }
}

impl Network {
    fn new(inputs: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let init = Uniform::new(-0.5, 0.5);
        let w_hidden = Array2::random_using((hidden, inputs), init, rng);
        let b_hidden = Array1::random_using(hidden, init, rng);
        let w_out = Array1::random_using(hidden, init, rng);
        let b_out = rng.sample(init);
        Self {
            w_hidden,
            b_hidden,
            w_out,
            b_out,
        }
    }

    /// Hidden activations for a batch of inputs, one row per sample
    fn activations(&self, xs: &Array2<f64>) -> Array2<f64> {
        (xs.dot(&self.w_hidden.t()) + &self.b_hidden).mapv(logistic)
    }

    fn predict(&self, x: &Array1<f64>) -> f64 {
        let hidden = (self.w_hidden.dot(x) + &self.b_hidden).mapv(logistic);
        self.w_out.dot(&hidden) + self.b_out
    }

    fn predict_batch(&self, xs: &Array2<f64>) -> Array1<f64> {
        self.activations(xs).dot(&self.w_out) + self.b_out
    }

    /// Full-batch Adam on mean squared error plus weight decay
    fn train(
        &mut self,
        xs: &Array2<f64>,
        ys: &Array1<f64>,
        epochs: usize,
        learning_rate: f64,
        decay: f64,
    ) {
        let n = xs.nrows() as f64;
        let mut m_hidden = Moments::zeros_like(&self.w_hidden);
        let mut m_hidden_bias = Moments::zeros_like(&self.b_hidden);
        let mut m_out = Moments::zeros_like(&self.w_out);
        let (mut first_bias, mut second_bias) = (0.0, 0.0);

        for epoch in 1..=epochs {
            let hidden = self.activations(xs);
            let prediction = hidden.dot(&self.w_out) + self.b_out;
            let delta = (prediction - ys) * (2.0 / n);

            let grad_out = hidden.t().dot(&delta);
            let grad_out_bias = delta.sum();

            // Back-propagate through the logistic units
            let mut back = hidden.mapv(|a| a * (1.0 - a));
            back *= &self.w_out;
            back *= &delta.view().insert_axis(Axis(1));
            let grad_hidden = back.t().dot(xs);
            let grad_hidden_bias = back.sum_axis(Axis(0));

            let step = AdamStep {
                learning_rate,
                decay,
                correction1: 1.0 - BETA1.powi(epoch as i32),
                correction2: 1.0 - BETA2.powi(epoch as i32),
            };
            m_hidden.apply(&mut self.w_hidden, &grad_hidden, &step);
            m_hidden_bias.apply(&mut self.b_hidden, &grad_hidden_bias, &step);
            m_out.apply(&mut self.w_out, &grad_out, &step);
            step.update(&mut self.b_out, grad_out_bias, &mut first_bias, &mut second_bias);
        }
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Nnetar {
    /// Create an NNAR model with default settings
    pub fn new() -> Self {
        Self::with_config(NnetarConfig::default())
    }

    /// Create an NNAR model from a configuration
    pub fn with_config(config: NnetarConfig) -> Self {
        Self {
            name: "NNETAR".to_string(),
            config,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.config.repeats == 0 {
            return Err(ForecastError::InvalidParameter(
                "At least one network must be trained".to_string(),
            ));
        }
        if self.config.p == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "At least one non-seasonal lag is required".to_string(),
            ));
        }
        if self.config.hidden == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "Hidden layer needs at least one unit".to_string(),
            ));
        }
        if !(self.config.learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Learning rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn select_lags(&self, scaled: &[f64]) -> Result<(usize, usize, Vec<usize>)> {
        let p = match self.config.p {
            Some(p) => p,
            None => ar_order_aic(scaled, self.config.max_p)?.order.max(1),
        };

        let m = self.config.period;
        let mut seasonal = 0;
        if m > p {
            // Only keep seasonal lags the data can support with a useful sample.
            while seasonal < self.config.seasonal_lags && scaled.len() > (seasonal + 1) * m + m {
                seasonal += 1;
            }
        }

        let mut lags: Vec<usize> = (1..=p).collect();
        lags.extend((1..=seasonal).map(|k| k * m));
        Ok((p, seasonal, lags))
    }
}

impl Default for Nnetar {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastModel for Nnetar {
    type Trained = TrainedNnetar;

    fn train(&self, data: &PriceSeries) -> Result<TrainedNnetar> {
        self.validate()?;
        let values = data.values();
        if values.len() < 3 {
            return Err(ForecastError::ValidationError(
                "NNETAR needs at least 3 observations".to_string(),
            ));
        }

        let (scaled, centre, scale) = standardize(values)?;
        let (p, seasonal, lags) = self.select_lags(&scaled)?;
        let max_lag = *lags.iter().max().unwrap_or(&1);
        if scaled.len() <= max_lag + 1 {
            return Err(ForecastError::ValidationError(format!(
                "Insufficient data for lag {}",
                max_lag
            )));
        }

        let hidden = self
            .config
            .hidden
            .unwrap_or_else(|| ((p + seasonal + 1) as f64 / 2.0).round().max(1.0) as usize);

        let samples = scaled.len() - max_lag;
        let xs = Array2::from_shape_fn((samples, lags.len()), |(i, j)| {
            scaled[max_lag + i - lags[j]]
        });
        let ys = Array1::from(scaled[max_lag..].to_vec());

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let networks: Vec<Network> = (0..self.config.repeats)
            .map(|_| {
                let mut net = Network::new(lags.len(), hidden, &mut rng);
                net.train(
                    &xs,
                    &ys,
                    self.config.epochs,
                    self.config.learning_rate,
                    self.config.decay,
                );
                net
            })
            .collect();

        let mut predictions = Array1::<f64>::zeros(samples);
        for net in &networks {
            predictions += &net.predict_batch(&xs);
        }
        predictions /= networks.len() as f64;

        let sum_sq = (&ys - &predictions).mapv(|e| e * e).sum();
        let mut fitted = vec![f64::NAN; max_lag];
        fitted.extend(predictions.iter().map(|p| p * scale + centre));
        let sigma = (sum_sq / ys.len() as f64).sqrt();

        let name = if seasonal > 0 {
            format!("NNAR({},{},{})[{}]", p, seasonal, hidden, self.config.period)
        } else {
            format!("NNAR({},{})", p, hidden)
        };
        debug!(model = %name, sigma, "trained NNETAR");

        Ok(TrainedNnetar {
            name,
            lags,
            networks,
            centre,
            scale,
            scaled,
            sigma,
            simulation_paths: self.config.simulation_paths,
            seed: self.config.seed,
            fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn average(networks: &[Network], x: &Array1<f64>) -> f64 {
    networks.iter().map(|n| n.predict(x)).sum::<f64>() / networks.len() as f64
}

impl TrainedNnetar {
    /// Lags used as network inputs
    pub fn lags(&self) -> &[usize] {
        &self.lags
    }

    /// Iterate the averaged network forward, adding `noise(step)` to each output
    fn roll_forward<F>(&self, horizon: usize, mut noise: F) -> Vec<f64>
    where
        F: FnMut() -> f64,
    {
        let mut history = self.scaled.clone();
        let mut input = Array1::<f64>::zeros(self.lags.len());
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let t = history.len();
            for (slot, lag) in input.iter_mut().zip(&self.lags) {
                *slot = history[t - lag];
            }
            let next = average(&self.networks, &input) + noise();
            history.push(next);
            out.push(next * self.scale + self.centre);
        }
        out
    }
}

impl TrainedForecastModel for TrainedNnetar {
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        validate_levels(levels)?;
        let values = self.roll_forward(horizon, || 0.0);

        if levels.is_empty() || self.simulation_paths == 0 || horizon == 0 {
            return ForecastResult::new(values, horizon);
        }

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let innovation = Normal::new(0.0, self.sigma)
            .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
        let paths: Vec<Vec<f64>> = (0..self.simulation_paths)
            .map(|_| self.roll_forward(horizon, || innovation.sample(&mut rng)))
            .collect();
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
        format!(
            "{}; average of {} networks; lags = {:?}; sigma = {:.4}",
            self.name,
            self.networks.len(),
            self.lags,
            self.sigma * self.scale
        )
    }
}
