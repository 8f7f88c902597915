//! KPSS level-stationarity test and differencing order selection

use crate::descriptive::mean;
use crate::differencing::difference;
use crate::{MathError, Result};

/// Significance levels with tabulated KPSS (level) critical values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpssLevel {
    TenPercent,
    FivePercent,
    TwoPointFivePercent,
    OnePercent,
}

impl KpssLevel {
    /// Critical value of the level-stationarity statistic
    pub fn critical_value(self) -> f64 {
        match self {
            KpssLevel::TenPercent => 0.347,
            KpssLevel::FivePercent => 0.463,
            KpssLevel::TwoPointFivePercent => 0.574,
            KpssLevel::OnePercent => 0.739,
        }
    }
}

/// Default Newey-West truncation lag, `trunc(4 * (n / 100)^0.25)`
pub fn default_kpss_lags(n: usize) -> usize {
    (4.0 * (n as f64 / 100.0).powf(0.25)).trunc() as usize
}

/// KPSS statistic for the null of level stationarity.
///
/// `lags` is the Bartlett-window truncation used for the long-run variance.
pub fn kpss_statistic(values: &[f64], lags: usize) -> Result<f64> {
    let n = values.len();
    if n < 3 {
        return Err(MathError::InsufficientData(
            "KPSS test needs at least 3 observations".to_string(),
        ));
    }

    let m = mean(values)?;
    let residuals: Vec<f64> = values.iter().map(|v| v - m).collect();

    let mut partial = 0.0;
    let mut eta = 0.0;
    for e in &residuals {
        partial += e;
        eta += partial * partial;
    }
    let nf = n as f64;
    eta /= nf * nf;

    let mut long_run = residuals.iter().map(|e| e * e).sum::<f64>() / nf;
    for lag in 1..=lags.min(n - 1) {
        let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let cov: f64 = residuals[lag..]
            .iter()
            .zip(&residuals)
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / nf;
        long_run += 2.0 * weight * cov;
    }

    if long_run <= 0.0 {
        return Err(MathError::CalculationError(
            "Long-run variance is not positive".to_string(),
        ));
    }

    Ok(eta / long_run)
}

/// Number of first differences needed for level stationarity.
///
/// Differences repeatedly while the KPSS statistic exceeds the critical value
/// at `level`, up to `max_d`. A series that becomes constant stops the search.
pub fn ndiffs(values: &[f64], level: KpssLevel, max_d: usize) -> Result<usize> {
    let mut current = values.to_vec();
    let mut d = 0;

    while d < max_d {
        if is_constant(&current) {
            break;
        }
        let stat = kpss_statistic(&current, default_kpss_lags(current.len()))?;
        if stat <= level.critical_value() {
            break;
        }
        current = difference(&current, 1, 1);
        d += 1;
    }

    Ok(d)
}

fn is_constant(values: &[f64]) -> bool {
    values
        .first()
        .map(|first| values.iter().all(|v| (v - first).abs() < 1e-12))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 0.3).unwrap();
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    #[test]
    fn test_white_noise_needs_no_difference() {
        let series = noise(500, 7);
        assert_eq!(ndiffs(&series, KpssLevel::OnePercent, 2).unwrap(), 0);
    }

    #[test]
    fn test_random_walk_needs_one_difference() {
        let steps = noise(500, 11);
        let walk: Vec<f64> = steps
            .iter()
            .scan(0.0, |acc, s| {
                *acc += s;
                Some(*acc)
            })
            .collect();
        assert_eq!(ndiffs(&walk, KpssLevel::FivePercent, 2).unwrap(), 1);
    }

    #[test]
    fn test_linear_trend_is_not_level_stationary() {
        let trend: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let stat = kpss_statistic(&trend, default_kpss_lags(trend.len())).unwrap();
        assert!(stat > KpssLevel::OnePercent.critical_value());
    }

    #[test]
    fn test_default_lags() {
        assert_eq!(default_kpss_lags(100), 4);
        assert_eq!(default_kpss_lags(2000), 8);
    }
}
