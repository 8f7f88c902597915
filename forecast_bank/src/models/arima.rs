//! ARIMA with automatic order selection

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{normal_intervals, ForecastModel, ForecastResult, TrainedForecastModel};
use serde::{Deserialize, Serialize};
use series_math::differencing::{difference, difference_polynomial, integrate};
use series_math::stationarity::{ndiffs, KpssLevel};
use series_math::{nelder_mead, NelderMeadConfig};
use std::collections::HashSet;
use std::f64::consts::PI;
use tracing::debug;

/// Search space and estimation settings for [`AutoArima`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaConfig {
    /// Largest AR order considered
    pub max_p: usize,
    /// Largest differencing order considered
    pub max_d: usize,
    /// Largest MA order considered
    pub max_q: usize,
    /// Stepwise search instead of trying every order
    pub stepwise: bool,
    /// Upper bound on models fitted during the search
    pub max_models: usize,
    /// Consider a constant (drift when d = 1) for d <= 1
    pub allow_constant: bool,
    /// Force the differencing order instead of testing for it
    pub d: Option<usize>,
    /// Optimiser settings for conditional sum of squares
    pub optimizer: NelderMeadConfig,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            stepwise: true,
            max_models: 94,
            allow_constant: true,
            d: None,
            optimizer: NelderMeadConfig::default(),
        }
    }
}

/// ARIMA order with an optional constant term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArimaOrder {
    /// AR order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// MA order
    pub q: usize,
    /// Whether a mean (d = 0) or drift (d = 1) is estimated
    pub constant: bool,
}

impl ArimaOrder {
    /// Create an order without a constant
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            constant: false,
        }
    }

    /// Same order with a constant term
    pub fn with_constant(mut self) -> Self {
        self.constant = true;
        self
    }

    fn num_coefficients(&self) -> usize {
        self.p + self.q + usize::from(self.constant)
    }
}

/// ARIMA model with automatic order selection by AICc
#[derive(Debug, Clone)]
pub struct AutoArima {
    name: String,
    config: ArimaConfig,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArima {
    name: String,
    order: ArimaOrder,
    /// AR coefficients, lag 1 first
    ar: Vec<f64>,
    /// MA coefficients, lag 1 first
    ma: Vec<f64>,
    /// Mean of the differenced series (0 without a constant)
    mean: f64,
    /// Innovation variance
    sigma2: f64,
    aicc: f64,
    /// Training data on the original scale
    history: Vec<f64>,
    /// Differenced training data
    differenced: Vec<f64>,
    /// Residuals on the differenced scale
    residuals: Vec<f64>,
    fitted: Vec<f64>,
}

impl AutoArima {
    /// Create an automatic ARIMA with the default search space
    pub fn new() -> Self {
        Self::with_config(ArimaConfig::default())
    }

    /// Create an automatic ARIMA with a custom search space
    pub fn with_config(config: ArimaConfig) -> Self {
        Self {
            name: "ARIMA".to_string(),
            config,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.config.max_d > 2 {
            return Err(ForecastError::InvalidParameter(
                "Differencing order above 2 is not supported".to_string(),
            ));
        }
        if self.config.max_models == 0 {
            return Err(ForecastError::InvalidParameter(
                "At least one model must be fitted".to_string(),
            ));
        }
        Ok(())
    }

    fn candidate_orders_near(&self, best: ArimaOrder, constant_allowed: bool) -> Vec<ArimaOrder> {
        let mut out = Vec::new();
        let steps: [(i64, i64); 8] = [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (1, 1),
            (-1, 1),
            (1, -1),
        ];
        for (dp, dq) in steps {
            let p = best.p as i64 + dp;
            let q = best.q as i64 + dq;
            if p < 0 || q < 0 || p as usize > self.config.max_p || q as usize > self.config.max_q {
                continue;
            }
            out.push(ArimaOrder {
                p: p as usize,
                q: q as usize,
                ..best
            });
        }
        if constant_allowed {
            out.push(ArimaOrder {
                constant: !best.constant,
                ..best
            });
        }
        out
    }
}

impl Default for AutoArima {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastModel for AutoArima {
    type Trained = TrainedArima;

    fn train(&self, data: &PriceSeries) -> Result<TrainedArima> {
        self.validate()?;
        let values = data.values();

        let d = match self.config.d {
            Some(d) => d,
            None => ndiffs(values, KpssLevel::FivePercent, self.config.max_d)?,
        };
        let constant_allowed = self.config.allow_constant && d <= 1;
        debug!(d, constant_allowed, "selected differencing order");

        let mut visited = HashSet::new();
        let mut best: Option<TrainedArima> = None;

        let try_order = |order: ArimaOrder,
                         visited: &mut HashSet<ArimaOrder>,
                         best: &mut Option<TrainedArima>| {
            if !visited.insert(order) {
                return false;
            }
            match fit_order(values, order, &self.config.optimizer) {
                Ok(model) => {
                    debug!(
                        p = order.p,
                        d = order.d,
                        q = order.q,
                        constant = order.constant,
                        aicc = model.aicc,
                        "fitted candidate"
                    );
                    let improves = best.as_ref().map_or(true, |b| model.aicc < b.aicc);
                    if improves {
                        *best = Some(model);
                    }
                    improves
                }
                Err(e) => {
                    debug!(p = order.p, q = order.q, error = %e, "candidate failed");
                    false
                }
            }
        };

        if self.config.stepwise {
            let start = [(2, 2), (0, 0), (1, 0), (0, 1)];
            for (p, q) in start {
                let order = ArimaOrder {
                    p: p.min(self.config.max_p),
                    d,
                    q: q.min(self.config.max_q),
                    constant: constant_allowed,
                };
                try_order(order, &mut visited, &mut best);
            }
            if constant_allowed {
                try_order(ArimaOrder::new(0, d, 0), &mut visited, &mut best);
            }

            loop {
                if visited.len() >= self.config.max_models {
                    break;
                }
                let current = match &best {
                    Some(b) => b.order,
                    None => break,
                };
                let mut moved = false;
                for order in self.candidate_orders_near(current, constant_allowed) {
                    if visited.len() >= self.config.max_models {
                        break;
                    }
                    if try_order(order, &mut visited, &mut best) {
                        moved = true;
                        break;
                    }
                }
                if !moved {
                    break;
                }
            }
        } else {
            let constants: &[bool] = if constant_allowed { &[true, false] } else { &[false] };
            'search: for p in 0..=self.config.max_p {
                for q in 0..=self.config.max_q {
                    for &constant in constants {
                        if visited.len() >= self.config.max_models {
                            break 'search;
                        }
                        try_order(ArimaOrder { p, d, q, constant }, &mut visited, &mut best);
                    }
                }
            }
        }

        let mut model = best.ok_or_else(|| {
            ForecastError::ForecastingError("No ARIMA order could be fitted".to_string())
        })?;
        model.name = format!("ARIMA({},{},{})", model.order.p, model.order.d, model.order.q);
        debug!(model = %model.name, models_fitted = visited.len(), "ARIMA search finished");
        Ok(model)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fit one ARIMA order by conditional sum of squares
pub fn fit_order(
    values: &[f64],
    order: ArimaOrder,
    optimizer: &NelderMeadConfig,
) -> Result<TrainedArima> {
    let ArimaOrder { p, d, q, constant } = order;
    let differenced = difference(values, d, 1);
    let k = order.num_coefficients() + 1;
    if differenced.len() <= p + k + 1 {
        return Err(ForecastError::ValidationError(format!(
            "Insufficient data for ARIMA({},{},{}). Need more than {} observations.",
            p,
            d,
            q,
            d + p + k + 1
        )));
    }

    let mean_diff = differenced.iter().sum::<f64>() / differenced.len() as f64;
    let mut initial = Vec::with_capacity(order.num_coefficients());
    if constant {
        initial.push(mean_diff);
    }
    initial.extend(std::iter::repeat(0.0).take(p + q));

    let split = |params: &[f64]| -> (f64, Vec<f64>, Vec<f64>) {
        let offset = usize::from(constant);
        let mean = if constant { params[0] } else { 0.0 };
        (
            mean,
            params[offset..offset + p].to_vec(),
            params[offset + p..].to_vec(),
        )
    };

    let n_eff = (differenced.len() - p) as f64;
    let objective = |params: &[f64]| {
        let (mean, ar, ma) = split(params);
        if !is_stationary(&ar) || !is_invertible(&ma) {
            return f64::INFINITY;
        }
        let css: f64 = css_residuals(&differenced, mean, &ar, &ma)
            .iter()
            .map(|e| e * e)
            .sum();
        0.5 * n_eff * (css / n_eff).ln()
    };

    let params = if initial.is_empty() {
        Vec::new()
    } else {
        nelder_mead(objective, &initial, None, optimizer).point
    };
    let (mean, ar, ma) = split(&params);

    let residuals = css_residuals(&differenced, mean, &ar, &ma);
    let css: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma2 = css / n_eff;
    if !(sigma2.is_finite() && sigma2 > 0.0) {
        return Err(ForecastError::ForecastingError(format!(
            "Degenerate residual variance for ARIMA({},{},{})",
            p, d, q
        )));
    }

    let loglik = -0.5 * n_eff * ((2.0 * PI * sigma2).ln() + 1.0);
    let kf = k as f64;
    let aicc = -2.0 * loglik + 2.0 * kf + 2.0 * kf * (kf + 1.0) / (n_eff - kf - 1.0);

    // Residuals are the same on the level scale, so fitted = observed - residual.
    let burn_in = d + p;
    let fitted = values
        .iter()
        .enumerate()
        .map(|(t, y)| {
            if t < burn_in {
                f64::NAN
            } else {
                y - residuals[t - d]
            }
        })
        .collect();

    Ok(TrainedArima {
        name: format!("ARIMA({},{},{})", p, d, q),
        order,
        ar,
        ma,
        mean,
        sigma2,
        aicc,
        history: values.to_vec(),
        differenced,
        residuals,
        fitted,
    })
}

/// One-step residuals of an ARMA on `x`, zero before the first AR lag is available
fn css_residuals(x: &[f64], mean: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut residuals = vec![0.0; x.len()];
    for t in p..x.len() {
        let mut pred = mean;
        for (i, phi) in ar.iter().enumerate() {
            pred += phi * (x[t - 1 - i] - mean);
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                pred += theta * residuals[t - 1 - j];
            }
        }
        residuals[t] = x[t] - pred;
    }
    residuals
}

/// AR polynomial stationarity via the step-down recursion on partial autocorrelations
fn is_stationary(ar: &[f64]) -> bool {
    let mut a = ar.to_vec();
    while let Some(&kappa) = a.last() {
        if kappa.abs() >= 1.0 {
            return false;
        }
        let k = a.len();
        let denom = 1.0 - kappa * kappa;
        a = (0..k - 1)
            .map(|j| (a[j] + kappa * a[k - 2 - j]) / denom)
            .collect();
    }
    true
}

fn is_invertible(ma: &[f64]) -> bool {
    let negated: Vec<f64> = ma.iter().map(|t| -t).collect();
    is_stationary(&negated)
}

impl TrainedArima {
    /// Selected order
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// AR coefficients, lag 1 first
    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    /// MA coefficients, lag 1 first
    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    /// Innovation variance
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Corrected Akaike information criterion
    pub fn aicc(&self) -> f64 {
        self.aicc
    }

    /// Psi weights of the integrated process, `psi[0] = 1`
    fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        // Full AR operator phi(B) (1 - B)^d
        let mut ar_poly = vec![1.0];
        ar_poly.extend(self.ar.iter().map(|phi| -phi));
        let diff_poly = difference_polynomial(self.order.d);
        let mut full = vec![0.0; ar_poly.len() + diff_poly.len() - 1];
        for (i, a) in ar_poly.iter().enumerate() {
            for (j, b) in diff_poly.iter().enumerate() {
                full[i + j] += a * b;
            }
        }
        let phi_star: Vec<f64> = full[1..].iter().map(|c| -c).collect();

        let mut psi = vec![0.0; horizon.max(1)];
        psi[0] = 1.0;
        for j in 1..psi.len() {
            let mut value = self.ma.get(j - 1).copied().unwrap_or(0.0);
            for i in 1..=phi_star.len().min(j) {
                value += phi_star[i - 1] * psi[j - i];
            }
            psi[j] = value;
        }
        psi
    }
}

impl TrainedForecastModel for TrainedArima {
    fn forecast_with_levels(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        if self.history.is_empty() {
            return Err(ForecastError::ForecastingError(
                "Model has not been fitted to data".to_string(),
            ));
        }

        let p = self.ar.len();
        let q = self.ma.len();
        let mut extended = self.differenced.clone();
        let mut shocks = self.residuals.clone();

        for _ in 0..horizon {
            let t = extended.len();
            let mut pred = self.mean;
            for i in 0..p.min(t) {
                pred += self.ar[i] * (extended[t - 1 - i] - self.mean);
            }
            for j in 0..q.min(t) {
                pred += self.ma[j] * shocks[t - 1 - j];
            }
            extended.push(pred);
            shocks.push(0.0);
        }

        let on_diff_scale = &extended[self.differenced.len()..];
        let values = integrate(on_diff_scale, &self.history, self.order.d);

        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        let std_errors: Vec<f64> = (0..horizon)
            .map(|h| {
                cumulative += psi[h] * psi[h];
                (self.sigma2 * cumulative).sqrt()
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
        let constant = match (self.order.constant, self.order.d) {
            (false, _) => String::new(),
            (true, 0) => format!(" with mean {:.6}", self.mean),
            (true, _) => format!(" with drift {:.6}", self.mean),
        };
        format!(
            "{}{}; ar = {:?}; ma = {:?}; sigma^2 = {:.3e}; AICc = {:.2}",
            self.name,
            constant,
            rounded(&self.ar),
            rounded(&self.ma),
            self.sigma2,
            self.aicc
        )
    }
}

fn rounded(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v * 1e4).round() / 1e4).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stationarity_check() {
        assert!(is_stationary(&[0.5]));
        assert!(!is_stationary(&[1.2]));
        assert!(is_stationary(&[0.5, 0.3]));
        // 1 - 0.5B - 0.6B^2 has a root inside the unit circle.
        assert!(!is_stationary(&[0.5, 0.6]));
        assert!(is_invertible(&[0.4]));
        assert!(!is_invertible(&[-1.5]));
    }

    #[test]
    fn test_css_residuals_pure_ar() {
        let x = [1.0, 0.5, 0.25, 0.125];
        let residuals = css_residuals(&x, 0.0, &[0.5], &[]);
        assert!(residuals.iter().all(|e| e.abs() < 1e-12));
    }
}
