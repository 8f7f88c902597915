//! Configuration management
//!
//! A report run is described by one [`ReportConfig`], normally read from a
//! TOML file. Every section and field has a default, so an empty file (or
//! none at all) reproduces the standard comparison.

use crate::error::{ForecastError, Result};
use crate::models::arima::ArimaConfig;
use crate::models::combination::DEFAULT_MEMBERS;
use crate::models::ets::EtsConfig;
use crate::models::holt_winters::HoltWintersConfig;
use crate::models::nnetar::NnetarConfig;
use crate::models::prophet::ProphetConfig;
use crate::models::{validate_levels, ModelKind, DEFAULT_LEVELS};
use crate::split::year_day;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input file and column settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with the price history
    pub path: Option<PathBuf>,
    /// Date column; detected by name when unset
    pub date_column: Option<String>,
    /// Price column; first non-date column when unset
    pub price_column: Option<String>,
    /// First date, used when the file has no date column
    pub origin: Option<NaiveDate>,
    /// Take natural logs of the prices
    pub log_transform: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            date_column: None,
            price_column: None,
            origin: None,
            log_transform: true,
        }
    }
}

/// Where the training window ends, as a year and day of year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_end_year: i32,
    pub train_end_day: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_end_year: 2022,
            train_end_day: 365,
        }
    }
}

impl SplitConfig {
    /// Last training date
    pub fn train_end(&self) -> Result<NaiveDate> {
        year_day(self.train_end_year, self.train_end_day)
    }

    /// Set the last training date
    pub fn set_train_end(&mut self, date: NaiveDate) {
        self.train_end_year = date.year();
        self.train_end_day = date.ordinal();
    }
}

/// Forecast combination settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinationConfig {
    pub enabled: bool,
    /// Models averaged into the combined forecast
    pub members: Vec<ModelKind>,
}

impl Default for CombinationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            members: DEFAULT_MEMBERS.to_vec(),
        }
    }
}

/// Reference forecasts added to the ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Include the random-walk forecast
    pub naive: bool,
}

/// Report output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prediction interval levels in percent
    pub levels: Vec<f64>,
    /// Write the full report as JSON here
    pub json: Option<PathBuf>,
    /// Write the accuracy table as CSV here
    pub csv: Option<PathBuf>,
    /// Write test-window forecasts as CSV here
    pub forecasts: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            json: None,
            csv: None,
            forecasts: None,
        }
    }
}

/// Models run when no list is configured
pub const DEFAULT_MODELS: [ModelKind; 5] = [
    ModelKind::Arima,
    ModelKind::Ets,
    ModelKind::HoltWinters,
    ModelKind::Nnetar,
    ModelKind::Prophet,
];

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Individual models to fit, in report order
    pub models: Vec<ModelKind>,
    pub data: DataConfig,
    pub split: SplitConfig,
    pub arima: ArimaConfig,
    pub ets: EtsConfig,
    pub holt_winters: HoltWintersConfig,
    pub nnetar: NnetarConfig,
    pub prophet: ProphetConfig,
    pub combination: CombinationConfig,
    pub benchmark: BenchmarkConfig,
    pub output: OutputConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.to_vec(),
            data: DataConfig::default(),
            split: SplitConfig::default(),
            arima: ArimaConfig::default(),
            ets: EtsConfig::default(),
            holt_winters: HoltWintersConfig::default(),
            nnetar: NnetarConfig::default(),
            prophet: ProphetConfig::default(),
            combination: CombinationConfig::default(),
            benchmark: BenchmarkConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReportConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ForecastError::ConfigError(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Use one seed for every stochastic model
    pub fn set_seed(&mut self, seed: u64) {
        self.nnetar.seed = seed;
        self.prophet.seed = seed;
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.split.train_end()?;
        validate_levels(&self.output.levels)?;

        if self.models.contains(&ModelKind::Combination) {
            return Err(ForecastError::ConfigError(
                "Combination is configured in [combination], not in models".to_string(),
            ));
        }
        if self.models.contains(&ModelKind::Naive) {
            return Err(ForecastError::ConfigError(
                "Naive is enabled with benchmark.naive, not in models".to_string(),
            ));
        }
        for (i, kind) in self.models.iter().enumerate() {
            if self.models[..i].contains(kind) {
                return Err(ForecastError::ConfigError(format!(
                    "Model {} is listed more than once",
                    kind
                )));
            }
        }
        if self.models.is_empty() && !self.benchmark.naive {
            return Err(ForecastError::ConfigError(
                "No models configured".to_string(),
            ));
        }

        if self.combination.enabled {
            if self.combination.members.is_empty() {
                return Err(ForecastError::ConfigError(
                    "Combination is enabled without members".to_string(),
                ));
            }
            for member in &self.combination.members {
                let available = self.models.contains(member)
                    || (*member == ModelKind::Naive && self.benchmark.naive);
                if !available {
                    return Err(ForecastError::ConfigError(format!(
                        "Combination member {} is not among the fitted models",
                        member
                    )));
                }
            }
        }

        Ok(())
    }
}
