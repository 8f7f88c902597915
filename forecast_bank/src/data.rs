//! Daily price series handling

use crate::config::DataConfig;
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Date format used in input files and exports
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A daily series with one observation per calendar day.
///
/// Dates are strictly increasing with a one day step; values are usually
/// natural-log prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    /// Series name (the price column)
    name: String,
    /// Observation dates
    dates: Vec<NaiveDate>,
    /// Observed values
    values: Vec<f64>,
}

impl PriceSeries {
    /// Create a series from dates and values, validating the daily index
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        Self::named("value", dates, values)
    }

    /// Create a named series from dates and values
    pub fn named(name: &str, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }

        for (i, pair) in dates.windows(2).enumerate() {
            if pair[1] - pair[0] != Duration::days(1) {
                return Err(ForecastError::DataError(format!(
                    "Series is not daily: {} is followed by {} at row {}",
                    pair[0],
                    pair[1],
                    i + 1
                )));
            }
        }

        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Non-finite value at {}",
                dates[i]
            )));
        }

        Ok(Self {
            name: name.to_string(),
            dates,
            values,
        })
    }

    /// Build a log-price series from raw prices starting at `origin`
    pub fn from_prices(name: &str, origin: NaiveDate, prices: &[f64]) -> Result<Self> {
        let dates = daily_dates(origin, prices.len());
        let values = log_prices(prices, &dates)?;
        Self::named(name, dates, values)
    }

    /// Series name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observation dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observed values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First observation date
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Last observation date
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Index of `date` in the series, if present
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        let first = self.first_date()?;
        let offset = (date - first).num_days();
        if offset < 0 || offset as usize >= self.len() {
            None
        } else {
            Some(offset as usize)
        }
    }

    /// Sub-series over `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len() {
            return Err(ForecastError::ValidationError(format!(
                "Invalid slice {}..{} of a series with {} observations",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            name: self.name.clone(),
            dates: self.dates[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// Dates that follow the series for `horizon` days
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        match self.last_date() {
            Some(last) => daily_dates(last + Duration::days(1), horizon),
            None => Vec::new(),
        }
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Mean of the values
    pub fn mean(&self) -> Result<f64> {
        Ok(series_math::descriptive::mean(&self.values)?)
    }

    /// Sample standard deviation of the values
    pub fn std_dev(&self) -> Result<f64> {
        Ok(series_math::descriptive::std_dev(&self.values)?)
    }
}

/// Consecutive daily dates starting at `origin`
pub fn daily_dates(origin: NaiveDate, count: usize) -> Vec<NaiveDate> {
    origin.iter_days().take(count).collect()
}

fn log_prices(prices: &[f64], dates: &[NaiveDate]) -> Result<Vec<f64>> {
    prices
        .iter()
        .zip(dates)
        .map(|(&p, date)| {
            if p > 0.0 && p.is_finite() {
                Ok(p.ln())
            } else {
                Err(ForecastError::DataError(format!(
                    "Price must be positive to take logs, got {} at {}",
                    p, date
                )))
            }
        })
        .collect()
}

/// Data loader for daily price files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a daily price series from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &DataConfig) -> Result<PriceSeries> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading price series");

        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df, config)
    }

    /// Build a price series from an existing DataFrame
    pub fn from_dataframe(df: DataFrame, config: &DataConfig) -> Result<PriceSeries> {
        let date_column = match &config.date_column {
            Some(name) => Some(name.clone()),
            None => Self::detect_date_column(&df),
        };
        let price_column = match &config.price_column {
            Some(name) => name.clone(),
            None => Self::detect_price_column(&df, date_column.as_deref())?,
        };
        debug!(?date_column, %price_column, rows = df.height(), "detected columns");

        let prices = Self::column_as_prices(&df, &price_column)?;

        let dates = match &date_column {
            Some(name) => Self::column_as_dates(&df, name)?,
            None => {
                let origin = config.origin.ok_or_else(|| {
                    ForecastError::DataError(
                        "No date column found and no origin date configured".to_string(),
                    )
                })?;
                daily_dates(origin, prices.len())
            }
        };

        let values = if config.log_transform {
            log_prices(&prices, &dates)?
        } else {
            prices
        };

        PriceSeries::named(&price_column, dates, values)
    }

    /// Detect the date column in a DataFrame
    fn detect_date_column(df: &DataFrame) -> Option<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("date") || lower_name.contains("time") {
                return Some(name.to_string());
            }
        }

        df.get_columns()
            .first()
            .filter(|col| col.dtype().is_temporal())
            .map(|col| col.name().to_string())
    }

    /// The price column is the first column that isn't the date column
    fn detect_price_column(df: &DataFrame, date_column: Option<&str>) -> Result<String> {
        df.get_column_names()
            .into_iter()
            .find(|name| Some(*name) != date_column)
            .map(|name| name.to_string())
            .ok_or_else(|| ForecastError::DataError("No price column found in data".to_string()))
    }

    fn column_as_prices(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
        let col = df.column(column_name).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", column_name, e))
        })?;

        // Non-numeric placeholders such as "." become nulls here.
        let numeric = col.cast(&DataType::Float64)?;
        numeric
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Missing value in column '{}' at row {}",
                        column_name,
                        row + 1
                    ))
                })
            })
            .collect()
    }

    fn column_as_dates(df: &DataFrame, column_name: &str) -> Result<Vec<NaiveDate>> {
        let col = df.column(column_name).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", column_name, e))
        })?;

        let text = col.cast(&DataType::Utf8)?;
        text.utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let raw = value.ok_or_else(|| {
                    ForecastError::DataError(format!("Missing date at row {}", row + 1))
                })?;
                // Datetime columns render with a time part; keep the date.
                let day = raw.get(..10).unwrap_or(raw);
                NaiveDate::parse_from_str(day, DATE_FORMAT).map_err(|e| {
                    ForecastError::DataError(format!(
                        "Invalid date '{}' at row {}: {}",
                        raw,
                        row + 1,
                        e
                    ))
                })
            })
            .collect()
    }
}
