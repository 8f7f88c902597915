use chrono::NaiveDate;
use forecast_bank::config::ReportConfig;
use forecast_bank::models::arima::ArimaConfig;
use forecast_bank::models::holt_winters::HoltWintersConfig;
use forecast_bank::models::nnetar::NnetarConfig;
use forecast_bank::{run_report, ForecastError, ModelKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

// Daily prices from 2022-01-01 to 2023-03-31
fn create_price_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "DATE,CBETHUSD").unwrap();

    let mut rng = StdRng::seed_from_u64(2023);
    let shocks = Normal::new(0.0, 0.025).unwrap();
    let mut log_price = 8.0_f64;
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();

    for (t, date) in start.iter_days().take_while(|d| *d <= end).enumerate() {
        log_price += shocks.sample(&mut rng);
        let weekly = 0.01 * ((t % 7) as f64 - 3.0);
        writeln!(file, "{},{:.2}", date.format("%Y-%m-%d"), (log_price + weekly).exp()).unwrap();
    }

    file
}

fn quick_config(data: &NamedTempFile) -> ReportConfig {
    let mut config = ReportConfig::default();
    config.data.path = Some(data.path().to_path_buf());
    config.arima = ArimaConfig {
        max_p: 2,
        max_q: 2,
        ..Default::default()
    };
    config.holt_winters = HoltWintersConfig {
        period: 7,
        ..Default::default()
    };
    config.nnetar = NnetarConfig {
        max_p: 7,
        period: 7,
        repeats: 3,
        epochs: 100,
        simulation_paths: 100,
        ..Default::default()
    };
    config.prophet.uncertainty_samples = 100;
    config.benchmark.naive = true;
    config
}

#[test]
fn test_full_report_workflow() {
    let data_file = create_price_file();
    let config = quick_config(&data_file);

    let report = run_report(&config).unwrap();

    // Split
    assert_eq!(report.split.train_end, NaiveDate::from_ymd_opt(2022, 12, 31).unwrap());
    assert_eq!(report.split.train_len, 365);
    assert_eq!(report.split.test_len, 90);
    assert_eq!(report.test_dates.len(), 90);

    // Every model forecasts the whole test window
    assert_eq!(report.runs.len(), 7);
    for run in &report.runs {
        assert_eq!(run.forecast.values().len(), report.split.test_len, "{}", run.name);
        assert_eq!(run.forecast.timestamps(), Some(report.test_dates.as_slice()));
    }

    // The combination is the exact mean of its members
    let member = |kind| report.run(kind).unwrap().forecast.values().to_vec();
    let arima = member(ModelKind::Arima);
    let ets = member(ModelKind::Ets);
    let hw = member(ModelKind::HoltWinters);
    let nnetar = member(ModelKind::Nnetar);
    let combined = member(ModelKind::Combination);
    for i in 0..combined.len() {
        assert_eq!(combined[i], (arima[i] + ets[i] + hw[i] + nnetar[i]) / 4.0);
    }

    // Ranking
    let rows = report.accuracy.rows();
    assert_eq!(rows.len(), 7);
    assert!(rows.windows(2).all(|w| w[0].test.rmse <= w[1].test.rmse));
    assert!(rows.iter().all(|r| r.test.rmse >= 0.0));

    let text = report.to_string();
    assert!(text.contains("Accuracy (ranked by test RMSE)"));
    assert!(text.contains("Combination (ARIMA, ETS, Holt-Winters, NNETAR)"));
}

#[test]
fn test_report_exports() {
    let data_file = create_price_file();
    let out = tempdir().unwrap();

    let mut config = quick_config(&data_file);
    config.models = vec![ModelKind::Arima, ModelKind::HoltWinters];
    config.combination.members = vec![ModelKind::Arima, ModelKind::HoltWinters];
    config.output.json = Some(out.path().join("report.json"));
    config.output.csv = Some(out.path().join("accuracy.csv"));
    config.output.forecasts = Some(out.path().join("forecasts.csv"));

    let report = run_report(&config).unwrap();
    report.write_outputs(&config).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path().join("report.json")).unwrap())
            .unwrap();
    assert_eq!(json["split"]["test_len"], 90);
    assert_eq!(json["runs"].as_array().unwrap().len(), 4);

    let accuracy = std::fs::read_to_string(out.path().join("accuracy.csv")).unwrap();
    assert!(accuracy.starts_with("rank,model,window,ME,RMSE"));

    let forecasts = std::fs::read_to_string(out.path().join("forecasts.csv")).unwrap();
    let lines: Vec<&str> = forecasts.lines().collect();
    assert_eq!(lines.len(), 91);
    assert!(lines[0].starts_with("date,actual,"));
    assert!(lines[1].starts_with("2023-01-01,"));
}

#[test]
fn test_report_requires_data_path() {
    let config = ReportConfig::default();
    assert!(matches!(run_report(&config), Err(ForecastError::ConfigError(_))));
}

#[test]
fn test_cutoff_outside_data() {
    let data_file = create_price_file();
    let mut config = quick_config(&data_file);
    config.split.set_train_end(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());

    assert!(matches!(run_report(&config), Err(ForecastError::ValidationError(_))));
}

#[test]
fn test_holt_winters_with_yearly_period_needs_two_years() {
    let data_file = create_price_file();
    let mut config = quick_config(&data_file);
    config.models = vec![ModelKind::HoltWinters];
    config.combination.enabled = false;
    config.holt_winters.period = 365;

    assert!(matches!(run_report(&config), Err(ForecastError::ValidationError(_))));
}
