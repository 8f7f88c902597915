//! Calendar train/test partitioning

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;

/// Date given as a year and a 1-based day of year, e.g. `(2022, 365)`
pub fn year_day(year: i32, ordinal: u32) -> Result<NaiveDate> {
    NaiveDate::from_yo_opt(year, ordinal).ok_or_else(|| {
        ForecastError::InvalidParameter(format!("Day {} does not exist in {}", ordinal, year))
    })
}

/// Contiguous, non-overlapping training and holdout windows of one series
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    train: PriceSeries,
    test: PriceSeries,
}

impl TrainTestSplit {
    /// Split so the training window ends on `train_end` (inclusive) and the
    /// test window holds every later observation.
    pub fn at(series: &PriceSeries, train_end: NaiveDate) -> Result<Self> {
        let first = series
            .first_date()
            .ok_or_else(|| ForecastError::DataError("Cannot split an empty series".to_string()))?;

        let train_len = match series.position(train_end) {
            Some(idx) => idx + 1,
            None => {
                return Err(ForecastError::ValidationError(format!(
                    "Cutoff {} is outside the series ({} to {})",
                    train_end,
                    first,
                    series.last_date().unwrap_or(first)
                )))
            }
        };

        if train_len == series.len() {
            return Err(ForecastError::ValidationError(format!(
                "Cutoff {} leaves no observations for the test window",
                train_end
            )));
        }

        Ok(Self {
            train: series.slice(0, train_len)?,
            test: series.slice(train_len, series.len())?,
        })
    }

    /// Training window
    pub fn train(&self) -> &PriceSeries {
        &self.train
    }

    /// Holdout window
    pub fn test(&self) -> &PriceSeries {
        &self.test
    }

    /// Forecast horizon implied by the holdout window
    pub fn horizon(&self) -> usize {
        self.test.len()
    }
}
