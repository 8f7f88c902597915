//! Metrics for evaluating forecast performance
//!
//! Errors are `actual - predicted`. Percentage metrics are in percent. MASE
//! scales by the in-sample mean absolute error of the one-step naive
//! forecast on the training data.

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::ForecastResult;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use tracing::debug;

fn check_pair(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

fn errors(actual: &[f64], predicted: &[f64]) -> Vec<f64> {
    actual.iter().zip(predicted).map(|(a, p)| a - p).collect()
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n as f64
}

/// Mean error (bias)
pub fn mean_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    Ok(average(errors(actual, predicted).into_iter()))
}

/// Root mean squared error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    Ok(average(errors(actual, predicted).into_iter().map(|e| e * e)).sqrt())
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    Ok(average(errors(actual, predicted).into_iter().map(f64::abs)))
}

/// Mean percentage error
pub fn mean_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    Ok(average(
        actual.iter().zip(predicted).map(|(a, p)| 100.0 * (a - p) / a),
    ))
}

/// Mean absolute percentage error
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    Ok(average(
        actual.iter().zip(predicted).map(|(a, p)| (100.0 * (a - p) / a).abs()),
    ))
}

/// Mean absolute one-step change of `training`, the MASE denominator
pub fn naive_scale(training: &[f64]) -> Result<f64> {
    if training.len() < 2 {
        return Err(ForecastError::ValidationError(
            "MASE scale needs at least two training observations".to_string(),
        ));
    }
    Ok(average(training.windows(2).map(|w| (w[1] - w[0]).abs())))
}

/// Mean absolute scaled error
pub fn mean_absolute_scaled_error(actual: &[f64], predicted: &[f64], scale: f64) -> Result<f64> {
    Ok(mean_absolute_error(actual, predicted)? / scale)
}

/// Lag-one autocorrelation of the errors
pub fn error_autocorrelation(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let e = errors(actual, predicted);
    if e.len() < 2 {
        return Ok(f64::NAN);
    }
    Ok(series_math::autocorrelation::acf(&e, 1)
        .map(|acf| acf[1])
        .unwrap_or(f64::NAN))
}

/// Accuracy measures for one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorMetrics {
    /// Mean Error
    pub me: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Percentage Error
    pub mpe: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Mean Absolute Scaled Error
    pub mase: f64,
    /// Lag-one autocorrelation of errors
    pub acf1: f64,
}

impl ErrorMetrics {
    /// Compute every metric over the indices where both inputs are finite
    pub fn compute(actual: &[f64], predicted: &[f64], scale: f64) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ForecastError::ValidationError(format!(
                "Predicted length ({}) doesn't match actual length ({})",
                predicted.len(),
                actual.len()
            )));
        }

        let (a, p): (Vec<f64>, Vec<f64>) = actual
            .iter()
            .zip(predicted)
            .filter(|(a, p)| a.is_finite() && p.is_finite())
            .map(|(a, p)| (*a, *p))
            .unzip();
        if a.is_empty() {
            return Err(ForecastError::ValidationError(
                "No finite predictions to evaluate".to_string(),
            ));
        }

        Ok(Self {
            me: mean_error(&a, &p)?,
            rmse: root_mean_squared_error(&a, &p)?,
            mae: mean_absolute_error(&a, &p)?,
            mpe: mean_percentage_error(&a, &p)?,
            mape: mean_absolute_percentage_error(&a, &p)?,
            mase: mean_absolute_scaled_error(&a, &p, scale)?,
            acf1: error_autocorrelation(&a, &p)?,
        })
    }
}

impl fmt::Display for ErrorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            self.me, self.rmse, self.mae, self.mpe, self.mape, self.mase, self.acf1
        )
    }
}

/// Training and test accuracy of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAccuracy {
    pub model: String,
    /// Fitted values against the training window, when the model has them
    pub training: Option<ErrorMetrics>,
    /// Forecast against the test window
    pub test: ErrorMetrics,
}

/// Evaluate a forecast (and the fitted values attached to it) against the
/// training and test windows
pub fn evaluate_model(
    name: &str,
    train: &PriceSeries,
    test: &PriceSeries,
    forecast: &ForecastResult,
) -> Result<ModelAccuracy> {
    if forecast.values().len() != test.len() {
        return Err(ForecastError::ValidationError(format!(
            "{} forecast has {} values but the test window has {}",
            name,
            forecast.values().len(),
            test.len()
        )));
    }

    if let Some(step) = forecast.values().iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::ForecastingError(format!(
            "{} forecast is not finite at step {}",
            name,
            step + 1
        )));
    }

    let scale = naive_scale(train.values())?;
    let test_metrics = ErrorMetrics::compute(test.values(), forecast.values(), scale)?;

    let fitted = forecast.fitted();
    let training = if fitted.len() == train.len() {
        match ErrorMetrics::compute(train.values(), fitted, scale) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                debug!(model = name, error = %e, "training metrics unavailable");
                None
            }
        }
    } else {
        None
    };

    Ok(ModelAccuracy {
        model: name.to_string(),
        training,
        test: test_metrics,
    })
}

/// Accuracy rows ranked by test RMSE, best first
#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    rows: Vec<ModelAccuracy>,
}

const HEADERS: [&str; 7] = ["ME", "RMSE", "MAE", "MPE", "MAPE", "MASE", "ACF1"];

fn by_test_rmse(a: &ModelAccuracy, b: &ModelAccuracy) -> Ordering {
    match (a.test.rmse.is_nan(), b.test.rmse.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.test.rmse.partial_cmp(&b.test.rmse).unwrap_or(Ordering::Equal),
    }
}

impl AccuracyReport {
    /// Rank rows by ascending test RMSE; NaN sorts last
    pub fn new(mut rows: Vec<ModelAccuracy>) -> Self {
        rows.sort_by(by_test_rmse);
        Self { rows }
    }

    /// Ranked rows
    pub fn rows(&self) -> &[ModelAccuracy] {
        &self.rows
    }

    /// Row with the lowest test RMSE
    pub fn best(&self) -> Option<&ModelAccuracy> {
        self.rows.first()
    }

    /// Row for a given model name
    pub fn get(&self, model: &str) -> Option<&ModelAccuracy> {
        self.rows.iter().find(|r| r.model == model)
    }

    /// Write the table as CSV, one row per model and window
    pub fn to_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec!["rank", "model", "window"];
        header.extend(HEADERS);
        wtr.write_record(&header)?;

        for (rank, row) in self.rows.iter().enumerate() {
            let windows = [("training", row.training.as_ref()), ("test", Some(&row.test))];
            for (window, metrics) in windows {
                let Some(m) = metrics else { continue };
                let mut record = vec![
                    (rank + 1).to_string(),
                    row.model.clone(),
                    window.to_string(),
                ];
                record.extend(
                    [m.me, m.rmse, m.mae, m.mpe, m.mape, m.mase, m.acf1]
                        .iter()
                        .map(|v| v.to_string()),
                );
                wtr.write_record(&record)?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

impl fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.model.len())
            .max()
            .unwrap_or(5)
            .max(5);

        write!(f, "{:>4}  {:<width$}  {:<8}", "Rank", "Model", "Set", width = width)?;
        for h in HEADERS {
            write!(f, " {:>9}", h)?;
        }
        writeln!(f)?;

        for (rank, row) in self.rows.iter().enumerate() {
            if let Some(training) = &row.training {
                writeln!(
                    f,
                    "{:>4}  {:<width$}  {:<8} {}",
                    rank + 1,
                    row.model,
                    "Training",
                    training,
                    width = width
                )?;
            }
            writeln!(
                f,
                "{:>4}  {:<width$}  {:<8} {}",
                rank + 1,
                row.model,
                "Test",
                row.test,
                width = width
            )?;
        }
        Ok(())
    }
}
