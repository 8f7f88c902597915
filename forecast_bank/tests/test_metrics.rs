use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use forecast_bank::data::daily_dates;
use forecast_bank::metrics::{
    error_autocorrelation, mean_absolute_error, mean_absolute_percentage_error,
    mean_absolute_scaled_error, mean_error, mean_percentage_error, naive_scale,
    root_mean_squared_error,
};
use forecast_bank::{
    evaluate_model, AccuracyReport, ErrorMetrics, ForecastError, ForecastResult, ModelAccuracy,
    PriceSeries,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn series(start: NaiveDate, values: Vec<f64>) -> PriceSeries {
    PriceSeries::new(daily_dates(start, values.len()), values).unwrap()
}

fn row(model: &str, rmse: f64) -> ModelAccuracy {
    ModelAccuracy {
        model: model.to_string(),
        training: None,
        test: ErrorMetrics {
            me: 0.0,
            rmse,
            mae: 0.0,
            mpe: 0.0,
            mape: 0.0,
            mase: 0.0,
            acf1: 0.0,
        },
    }
}

#[rstest]
#[case(vec![1.0, 2.0, 3.0])]
#[case(vec![5.5])]
#[case(vec![-4.0, 0.25, 1e6])]
fn test_rmse_of_identical_series_is_zero(#[case] x: Vec<f64>) {
    assert_eq!(root_mean_squared_error(&x, &x).unwrap(), 0.0);
}

#[test]
fn test_known_values() {
    let actual = [2.0, 4.0, 5.0, 4.0];
    let predicted = [1.0, 4.0, 6.0, 2.0];
    // errors: 1, 0, -1, 2

    assert_abs_diff_eq!(mean_error(&actual, &predicted).unwrap(), 0.5);
    assert_abs_diff_eq!(root_mean_squared_error(&actual, &predicted).unwrap(), 1.5_f64.sqrt());
    assert_abs_diff_eq!(mean_absolute_error(&actual, &predicted).unwrap(), 1.0);
    assert_abs_diff_eq!(
        mean_percentage_error(&actual, &predicted).unwrap(),
        (50.0 + 0.0 - 20.0 + 50.0) / 4.0
    );
    assert_abs_diff_eq!(
        mean_absolute_percentage_error(&actual, &predicted).unwrap(),
        (50.0 + 0.0 + 20.0 + 50.0) / 4.0
    );
    assert_abs_diff_eq!(
        mean_absolute_scaled_error(&actual, &predicted, 0.5).unwrap(),
        2.0
    );
}

#[test]
fn test_rmse_is_positive_for_any_difference() {
    let actual = [1.0, 2.0, 3.0];
    let predicted = [1.0, 2.0, 3.0001];
    assert!(root_mean_squared_error(&actual, &predicted).unwrap() > 0.0);
}

#[test]
fn test_length_mismatch() {
    let result = root_mean_squared_error(&[1.0, 2.0], &[1.0]);
    assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    assert!(mean_error(&[], &[]).is_err());
}

#[test]
fn test_naive_scale() {
    assert_abs_diff_eq!(naive_scale(&[1.0, 3.0, 2.0, 2.0]).unwrap(), 1.0);
    assert!(naive_scale(&[1.0]).is_err());
}

#[test]
fn test_error_autocorrelation_alternating() {
    let actual = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
    let predicted = [0.0; 6];
    assert!(error_autocorrelation(&actual, &predicted).unwrap() < -0.5);
}

#[test]
fn test_metrics_skip_missing_fitted_values() {
    let actual = [1.0, 2.0, 3.0];
    let predicted = [f64::NAN, 2.5, 3.5];
    let metrics = ErrorMetrics::compute(&actual, &predicted, 1.0).unwrap();
    assert_abs_diff_eq!(metrics.me, -0.5);
    assert_abs_diff_eq!(metrics.rmse, 0.5);
}

#[test]
fn test_evaluate_model() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let train = series(start, vec![1.0, 2.0, 3.0, 4.0]);
    let test = series(NaiveDate::from_ymd_opt(2022, 1, 5).unwrap(), vec![5.0, 6.0]);

    let forecast = ForecastResult::new(vec![5.0, 5.0], 2)
        .unwrap()
        .with_fitted(vec![f64::NAN, 1.0, 2.0, 3.0]);
    let accuracy = evaluate_model("Naive", &train, &test, &forecast).unwrap();

    assert_eq!(accuracy.model, "Naive");
    assert_abs_diff_eq!(accuracy.test.rmse, 0.5_f64.sqrt());
    assert_abs_diff_eq!(accuracy.test.mase, 0.5);
    let training = accuracy.training.unwrap();
    assert_abs_diff_eq!(training.mae, 1.0);
    assert_abs_diff_eq!(training.mase, 1.0);
}

#[test]
fn test_evaluate_model_without_fitted_values() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let train = series(start, vec![1.0, 2.0, 3.0]);
    let test = series(NaiveDate::from_ymd_opt(2022, 1, 4).unwrap(), vec![4.0]);
    let forecast = ForecastResult::new(vec![4.0], 1).unwrap();

    let accuracy = evaluate_model("Exact", &train, &test, &forecast).unwrap();
    assert!(accuracy.training.is_none());
    assert_eq!(accuracy.test.rmse, 0.0);
}

#[test]
fn test_evaluate_model_rejects_wrong_horizon() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let train = series(start, vec![1.0, 2.0, 3.0]);
    let test = series(NaiveDate::from_ymd_opt(2022, 1, 4).unwrap(), vec![4.0, 5.0]);
    let forecast = ForecastResult::new(vec![4.0], 1).unwrap();

    let result = evaluate_model("Short", &train, &test, &forecast);
    assert!(matches!(result, Err(ForecastError::ValidationError(_))));
}

#[test]
fn test_report_ranks_by_test_rmse() {
    let report = AccuracyReport::new(vec![
        row("B", 0.8),
        row("Broken", f64::NAN),
        row("A", 0.39),
        row("C", 0.86),
    ]);

    let order: Vec<&str> = report.rows().iter().map(|r| r.model.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C", "Broken"]);
    assert_eq!(report.best().unwrap().model, "A");
    assert!(report.get("C").is_some());
    assert!(report.get("D").is_none());
}

#[test]
fn test_report_display_and_csv() {
    let report = AccuracyReport::new(vec![row("ARIMA(1,1,0)", 0.5), row("Naive", 0.6)]);

    let table = report.to_string();
    assert!(table.contains("RMSE"));
    assert!(table.contains("ARIMA(1,1,0)"));

    let mut buffer = Vec::new();
    report.to_csv(&mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "rank,model,window,ME,RMSE,MAE,MPE,MAPE,MASE,ACF1");
    assert!(
        lines[1].starts_with("1,\"ARIMA(1,1,0)\",test,")
            || lines[1].starts_with("1,ARIMA(1,1,0),test,")
    );
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_diverging_forecast_is_rejected() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let train = series(start, vec![1.0, 1.2, 1.4, 1.5]);
    let test = series(
        NaiveDate::from_ymd_opt(2022, 1, 5).unwrap(),
        vec![1.5, 1.6, 1.7, 1.8],
    );

    let diverged = ForecastResult::new(vec![1.5, f64::NAN, f64::INFINITY, f64::NAN], 4).unwrap();
    let result = evaluate_model("Diverged", &train, &test, &diverged);
    assert!(matches!(result, Err(ForecastError::ForecastingError(_))));

    let close = ForecastResult::new(vec![1.5, 1.6, 1.7, 1.7], 4).unwrap();
    let accuracy = evaluate_model("Close", &train, &test, &close).unwrap();
    assert!(accuracy.test.rmse > 0.0);
    assert_abs_diff_eq!(accuracy.test.rmse, 0.05, epsilon = 1e-12);
}

#[test]
fn test_non_finite_fitted_values_still_allowed() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let train = series(start, vec![1.0, 2.0, 3.0]);
    let test = series(NaiveDate::from_ymd_opt(2022, 1, 4).unwrap(), vec![4.0]);
    let forecast = ForecastResult::new(vec![4.5], 1)
        .unwrap()
        .with_fitted(vec![f64::NAN, f64::NAN, f64::NAN]);

    let accuracy = evaluate_model("Warmup", &train, &test, &forecast).unwrap();
    assert!(accuracy.training.is_none());
    assert_abs_diff_eq!(accuracy.test.rmse, 0.5);
}
