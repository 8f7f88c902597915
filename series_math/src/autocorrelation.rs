//! Autocorrelation and autoregressive order selection

use crate::descriptive::mean;
use crate::{MathError, Result};

/// Sample autocovariances for lags `0..=max_lag` (biased, n denominator)
pub fn autocovariance(values: &[f64], max_lag: usize) -> Result<Vec<f64>> {
    let n = values.len();
    if n <= max_lag {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations for lag {}",
            max_lag, max_lag
        )));
    }

    let m = mean(values)?;
    let centred: Vec<f64> = values.iter().map(|v| v - m).collect();

    Ok((0..=max_lag)
        .map(|lag| {
            centred[lag..]
                .iter()
                .zip(centred.iter())
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / n as f64
        })
        .collect())
}

/// Sample autocorrelation function for lags `0..=max_lag`
pub fn acf(values: &[f64], max_lag: usize) -> Result<Vec<f64>> {
    let acov = autocovariance(values, max_lag)?;
    if acov[0] <= 0.0 {
        return Err(MathError::CalculationError(
            "Autocorrelation is undefined for a constant series".to_string(),
        ));
    }
    Ok(acov.iter().map(|c| c / acov[0]).collect())
}

/// Fit of an autoregression by the Yule-Walker equations
#[derive(Debug, Clone, PartialEq)]
pub struct YuleWalkerFit {
    /// Selected order
    pub order: usize,
    /// AR coefficients, lag 1 first
    pub coefficients: Vec<f64>,
    /// Innovation variance at the selected order
    pub variance: f64,
    /// AIC for each order `0..=max_order`
    pub aic: Vec<f64>,
}

/// Select an AR order by AIC using the Durbin-Levinson recursion.
///
/// Orders `0..=max_order` are considered (capped below the series length).
pub fn ar_order_aic(values: &[f64], max_order: usize) -> Result<YuleWalkerFit> {
    let n = values.len();
    if n < 3 {
        return Err(MathError::InsufficientData(
            "AR order selection needs at least 3 observations".to_string(),
        ));
    }

    let max_order = max_order.min(n - 2);
    let acov = autocovariance(values, max_order)?;
    if acov[0] <= 0.0 {
        return Ok(YuleWalkerFit {
            order: 0,
            coefficients: Vec::new(),
            variance: 0.0,
            aic: vec![0.0],
        });
    }

    let nf = n as f64;
    let mut phi: Vec<f64> = Vec::new();
    let mut variance = acov[0];
    let mut aic = vec![nf * variance.ln()];
    let mut best = (0usize, Vec::new(), variance);

    for k in 1..=max_order {
        let mut num = acov[k];
        for j in 0..phi.len() {
            num -= phi[j] * acov[k - 1 - j];
        }
        let reflection = num / variance;

        let mut next = vec![0.0; k];
        for j in 0..k - 1 {
            next[j] = phi[j] - reflection * phi[k - 2 - j];
        }
        next[k - 1] = reflection;
        phi = next;

        variance *= 1.0 - reflection * reflection;
        if variance <= 0.0 {
            break;
        }

        let score = nf * variance.ln() + 2.0 * k as f64;
        if score < aic.iter().cloned().fold(f64::INFINITY, f64::min) {
            best = (k, phi.clone(), variance);
        }
        aic.push(score);
    }

    Ok(YuleWalkerFit {
        order: best.0,
        coefficients: best.1,
        variance: best.2,
        aic,
    })
}
