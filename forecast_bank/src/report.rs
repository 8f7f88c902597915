//! End-to-end comparison: load, split, fit every model, combine, evaluate

use crate::config::ReportConfig;
use crate::data::{DataLoader, PriceSeries, DATE_FORMAT};
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_model, AccuracyReport};
use crate::models::arima::AutoArima;
use crate::models::combination::ForecastCombination;
use crate::models::ets::AutoEts;
use crate::models::holt_winters::HoltWinters;
use crate::models::naive::Naive;
use crate::models::nnetar::Nnetar;
use crate::models::prophet::Prophet;
use crate::models::{ForecastModel, ForecastResult, ModelKind, TrainedForecastModel};
use crate::split::TrainTestSplit;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, info_span};

/// One fitted model and its test-window forecast
#[derive(Debug, Clone, Serialize)]
pub struct ModelRun {
    pub kind: ModelKind,
    /// Display name, e.g. `ARIMA(2,1,0)`
    pub name: String,
    /// Selected specification and parameters
    pub specification: String,
    pub forecast: ForecastResult,
    /// Wall-clock fit and forecast time
    pub elapsed_ms: u64,
}

/// Dates and sizes of the two windows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub train_len: usize,
    pub test_len: usize,
}

impl SplitSummary {
    fn from_split(split: &TrainTestSplit) -> Result<Self> {
        let missing = || ForecastError::DataError("Empty split window".to_string());
        Ok(Self {
            train_start: split.train().first_date().ok_or_else(missing)?,
            train_end: split.train().last_date().ok_or_else(missing)?,
            test_start: split.test().first_date().ok_or_else(missing)?,
            test_end: split.test().last_date().ok_or_else(missing)?,
            train_len: split.train().len(),
            test_len: split.test().len(),
        })
    }
}

/// Fits the configured models on a training window
#[derive(Debug)]
pub struct ModelBank<'a> {
    config: &'a ReportConfig,
}

impl<'a> ModelBank<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self { config }
    }

    /// Fit one model and forecast the test window
    pub fn run_model(&self, kind: ModelKind, split: &TrainTestSplit) -> Result<ModelRun> {
        let _span = info_span!("model", model = %kind).entered();
        let c = self.config;
        match kind {
            ModelKind::Arima => self.fit(kind, &AutoArima::with_config(c.arima.clone()), split),
            ModelKind::Ets => self.fit(kind, &AutoEts::with_config(c.ets.clone()), split),
            ModelKind::HoltWinters => self.fit(
                kind,
                &HoltWinters::with_config(c.holt_winters.clone())?,
                split,
            ),
            ModelKind::Nnetar => self.fit(kind, &Nnetar::with_config(c.nnetar.clone()), split),
            ModelKind::Prophet => self.fit(kind, &Prophet::with_config(c.prophet.clone()), split),
            ModelKind::Naive => self.fit(kind, &Naive::new(), split),
            ModelKind::Combination => Err(ForecastError::InvalidParameter(
                "The combination is built from member runs, not fitted".to_string(),
            )),
        }
    }

    fn fit<M: ForecastModel>(
        &self,
        kind: ModelKind,
        model: &M,
        split: &TrainTestSplit,
    ) -> Result<ModelRun> {
        let started = Instant::now();
        info!(model = model.name(), "fitting");

        let trained = model.train(split.train())?;
        let forecast = trained
            .forecast_with_levels(split.horizon(), &self.config.output.levels)?
            .with_timestamps(split.test().dates().to_vec())?
            .with_fitted(trained.fitted_values().to_vec());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(model = trained.name(), elapsed_ms, "forecast ready");

        Ok(ModelRun {
            kind,
            name: trained.name().to_string(),
            specification: trained.specification(),
            forecast,
            elapsed_ms,
        })
    }

    /// Average the member runs into the combined forecast
    pub fn combine(&self, runs: &[ModelRun]) -> Result<ModelRun> {
        let combination = ForecastCombination::new(self.config.combination.members.clone())?;
        let members: Vec<&ModelRun> = combination
            .members()
            .iter()
            .map(|kind| {
                runs.iter().find(|r| r.kind == *kind).ok_or_else(|| {
                    ForecastError::ValidationError(format!(
                        "Combination member {} has no forecast",
                        kind
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let forecasts: Vec<&ForecastResult> = members.iter().map(|r| &r.forecast).collect();
        let fitted: Vec<&[f64]> = members.iter().map(|r| r.forecast.fitted()).collect();
        let combined_fitted = combination.combine_fitted(&fitted)?;
        let forecast = combination.combine(&forecasts)?.with_fitted(combined_fitted);

        let name = combination.name();
        Ok(ModelRun {
            kind: ModelKind::Combination,
            specification: name.clone(),
            name,
            forecast,
            elapsed_ms: 0,
        })
    }

    /// Fit every configured model, the benchmark and the combination
    pub fn run(&self, split: &TrainTestSplit) -> Result<Vec<ModelRun>> {
        let mut runs = Vec::new();
        for kind in &self.config.models {
            runs.push(self.run_model(*kind, split)?);
        }
        if self.config.benchmark.naive {
            runs.push(self.run_model(ModelKind::Naive, split)?);
        }
        if self.config.combination.enabled {
            let combined = self.combine(&runs)?;
            runs.push(combined);
        }
        Ok(runs)
    }
}

/// Everything the comparison produced
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub series: String,
    pub split: SplitSummary,
    pub test_dates: Vec<NaiveDate>,
    pub test_values: Vec<f64>,
    pub runs: Vec<ModelRun>,
    pub accuracy: AccuracyReport,
}

/// Load the configured data file and run the comparison
pub fn run_report(config: &ReportConfig) -> Result<ReportOutput> {
    let path = config.data.path.as_ref().ok_or_else(|| {
        ForecastError::ConfigError("No data file configured".to_string())
    })?;
    let series = DataLoader::from_csv(path, &config.data)?;
    run_report_for(&series, config)
}

/// Run the comparison on a series already in memory
pub fn run_report_for(series: &PriceSeries, config: &ReportConfig) -> Result<ReportOutput> {
    config.validate()?;
    let _span = info_span!("report", series = series.name()).entered();

    let split = TrainTestSplit::at(series, config.split.train_end()?)?;
    let summary = SplitSummary::from_split(&split)?;
    info!(
        train = summary.train_len,
        test = summary.test_len,
        "split {} .. {} | {} .. {}",
        summary.train_start,
        summary.train_end,
        summary.test_start,
        summary.test_end
    );

    let runs = ModelBank::new(config).run(&split)?;

    let rows = runs
        .iter()
        .map(|run| evaluate_model(&run.name, split.train(), split.test(), &run.forecast))
        .collect::<Result<Vec<_>>>()?;
    let accuracy = AccuracyReport::new(rows);
    if let Some(best) = accuracy.best() {
        info!(model = %best.model, rmse = best.test.rmse, "best test RMSE");
    }

    Ok(ReportOutput {
        series: series.name().to_string(),
        split: summary,
        test_dates: split.test().dates().to_vec(),
        test_values: split.test().values().to_vec(),
        runs,
        accuracy,
    })
}

impl ReportOutput {
    /// Run for a given model kind
    pub fn run(&self, kind: ModelKind) -> Option<&ModelRun> {
        self.runs.iter().find(|r| r.kind == kind)
    }

    /// Serialize the whole report as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write test dates, actual values and every model's forecast as CSV
    pub fn write_forecasts_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        let mut header = vec!["date".to_string(), "actual".to_string()];
        header.extend(self.runs.iter().map(|r| r.name.clone()));
        wtr.write_record(&header)?;

        for (i, (date, actual)) in self.test_dates.iter().zip(&self.test_values).enumerate() {
            let mut record = vec![date.format(DATE_FORMAT).to_string(), actual.to_string()];
            record.extend(self.runs.iter().map(|r| r.forecast.values()[i].to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write every export the output configuration asks for
    pub fn write_outputs(&self, config: &ReportConfig) -> Result<()> {
        if let Some(path) = &config.output.json {
            std::fs::write(path, self.to_json()?)?;
            info!(path = %path.display(), "wrote JSON report");
        }
        if let Some(path) = &config.output.csv {
            self.accuracy.to_csv(File::create(path)?)?;
            info!(path = %path.display(), "wrote accuracy table");
        }
        if let Some(path) = &config.output.forecasts {
            self.write_forecasts_csv(path)?;
            info!(path = %path.display(), "wrote forecasts");
        }
        Ok(())
    }
}

impl fmt::Display for ReportOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.split;
        writeln!(f, "Series: {}", self.series)?;
        writeln!(
            f,
            "Training: {} to {} ({} days)",
            s.train_start, s.train_end, s.train_len
        )?;
        writeln!(
            f,
            "Test:     {} to {} ({} days)",
            s.test_start, s.test_end, s.test_len
        )?;
        writeln!(f)?;
        writeln!(f, "Models:")?;
        for run in &self.runs {
            writeln!(f, "  {}", run.specification)?;
        }
        writeln!(f)?;
        writeln!(f, "Accuracy (ranked by test RMSE):")?;
        write!(f, "{}", self.accuracy)
    }
}
