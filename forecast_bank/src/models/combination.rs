//! Equal-weight forecast combination

use crate::error::{ForecastError, Result};
use crate::models::{ForecastResult, ModelKind};
use serde::{Deserialize, Serialize};

/// Models averaged when no membership is configured
pub const DEFAULT_MEMBERS: [ModelKind; 4] = [
    ModelKind::Arima,
    ModelKind::Ets,
    ModelKind::HoltWinters,
    ModelKind::Nnetar,
];

/// Unweighted arithmetic mean of several member forecasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCombination {
    members: Vec<ModelKind>,
}

impl ForecastCombination {
    /// Combine the given members
    pub fn new(members: Vec<ModelKind>) -> Result<Self> {
        if members.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Combination needs at least one member".to_string(),
            ));
        }
        if members.contains(&ModelKind::Combination) {
            return Err(ForecastError::InvalidParameter(
                "Combination cannot include itself".to_string(),
            ));
        }
        for (i, kind) in members.iter().enumerate() {
            if members[..i].contains(kind) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} is listed twice in the combination",
                    kind
                )));
            }
        }

        Ok(Self { members })
    }

    /// Member models, in the order forecasts are expected
    pub fn members(&self) -> &[ModelKind] {
        &self.members
    }

    /// Name shown in reports, e.g. `Combination (ARIMA, ETS)`
    pub fn name(&self) -> String {
        let labels: Vec<&str> = self.members.iter().map(|m| m.label()).collect();
        format!("Combination ({})", labels.join(", "))
    }

    /// Average the member forecasts step by step.
    ///
    /// `forecasts` follows [`members`](Self::members). The result carries no
    /// intervals; timestamps are kept when every member agrees on them.
    pub fn combine(&self, forecasts: &[&ForecastResult]) -> Result<ForecastResult> {
        self.check_count(forecasts.len())?;
        let horizon = forecasts[0].horizons();
        if let Some(f) = forecasts.iter().find(|f| f.horizons() != horizon) {
            return Err(ForecastError::ValidationError(format!(
                "Member forecasts disagree on horizon ({} vs {})",
                horizon,
                f.horizons()
            )));
        }

        let series: Vec<&[f64]> = forecasts.iter().map(|f| f.values()).collect();
        let values = mean_by_index(&series, horizon);
        let result = ForecastResult::new(values, horizon)?;

        match forecasts[0].timestamps() {
            Some(ts) if forecasts.iter().all(|f| f.timestamps() == Some(ts)) => {
                result.with_timestamps(ts.to_vec())
            }
            _ => Ok(result),
        }
    }

    /// Average in-sample fitted values; NaN wherever any member has none
    pub fn combine_fitted(&self, fitted: &[&[f64]]) -> Result<Vec<f64>> {
        self.check_count(fitted.len())?;
        let len = fitted[0].len();
        if fitted.iter().any(|f| f.len() != len) {
            return Err(ForecastError::ValidationError(
                "Member fitted values have different lengths".to_string(),
            ));
        }
        Ok(mean_by_index(fitted, len))
    }

    fn check_count(&self, count: usize) -> Result<()> {
        if count != self.members.len() {
            return Err(ForecastError::ValidationError(format!(
                "Expected {} member forecasts, got {}",
                self.members.len(),
                count
            )));
        }
        Ok(())
    }
}

impl Default for ForecastCombination {
    fn default() -> Self {
        Self {
            members: DEFAULT_MEMBERS.to_vec(),
        }
    }
}

fn mean_by_index(series: &[&[f64]], len: usize) -> Vec<f64> {
    let n = series.len() as f64;
    (0..len)
        .map(|i| series.iter().map(|s| s[i]).sum::<f64>() / n)
        .collect()
}
