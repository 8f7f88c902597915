//! Descriptive statistics over slices

use crate::{MathError, Result};

/// Arithmetic mean of the values
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty slice".to_string(),
        ));
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator)
pub fn variance(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(
            "Variance needs at least 2 observations".to_string(),
        ));
    }

    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Result<f64> {
    Ok(variance(values)?.sqrt())
}

/// Standardise values to zero mean and unit variance.
///
/// Returns the scaled values together with the `(mean, std_dev)` used, so the
/// transform can be inverted. A constant series is centred but not scaled.
pub fn standardize(values: &[f64]) -> Result<(Vec<f64>, f64, f64)> {
    let m = mean(values)?;
    let sd = if values.len() > 1 { std_dev(values)? } else { 0.0 };
    let scale = if sd > 1e-12 { sd } else { 1.0 };

    let scaled = values.iter().map(|v| (v - m) / scale).collect();
    Ok((scaled, m, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_and_variance() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&data).unwrap(), 5.0);
        assert_abs_diff_eq!(variance(&data).unwrap(), 32.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_input() {
        assert!(mean(&[]).is_err());
        assert!(variance(&[1.0]).is_err());
    }

    #[test]
    fn test_standardize_round_trip() {
        let data = [10.0, 20.0, 30.0];
        let (scaled, m, sd) = standardize(&data).unwrap();
        assert_abs_diff_eq!(scaled[1], 0.0);
        assert_abs_diff_eq!(scaled[2] * sd + m, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_constant_series() {
        let (scaled, m, sd) = standardize(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(m, 3.0);
        assert_eq!(sd, 1.0);
        assert!(scaled.iter().all(|v| *v == 0.0));
    }
}
