use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use forecast_bank::models::arima::{fit_order, ArimaConfig, ArimaOrder, AutoArima};
use forecast_bank::models::combination::ForecastCombination;
use forecast_bank::models::ets::{AutoEts, EtsConfig};
use forecast_bank::models::holt_winters::{HoltWinters, HoltWintersConfig};
use forecast_bank::models::naive::Naive;
use forecast_bank::models::nnetar::{Nnetar, NnetarConfig};
use forecast_bank::models::prophet::{Prophet, ProphetConfig, SeasonalityConfig, SeasonalityMode};
use forecast_bank::models::{ForecastModel, ForecastResult, ModelKind, TrainedForecastModel};
use forecast_bank::{ForecastError, PriceSeries};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rstest::rstest;
use series_math::NelderMeadConfig;

fn origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
}

/// Noisy log-price path with drift and a weekly pattern
fn sample_series(len: usize, seed: u64) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.02).unwrap();
    let mut level = 7.0;
    let values: Vec<f64> = (0..len)
        .map(|t| {
            level += 0.002 + noise.sample(&mut rng);
            level + 0.01 * ((t % 7) as f64 - 3.0)
        })
        .collect();
    let dates = forecast_bank::data::daily_dates(origin(), len);
    PriceSeries::new(dates, values).unwrap()
}

fn small_nnetar() -> Nnetar {
    Nnetar::with_config(NnetarConfig {
        max_p: 5,
        period: 7,
        repeats: 3,
        epochs: 100,
        simulation_paths: 100,
        ..Default::default()
    })
}

fn small_prophet() -> Prophet {
    Prophet::with_config(ProphetConfig {
        n_changepoints: 5,
        uncertainty_samples: 100,
        seasonalities: vec![SeasonalityConfig::new("weekly", 7.0, 3)],
        ..Default::default()
    })
}

fn small_arima() -> AutoArima {
    AutoArima::with_config(ArimaConfig {
        max_p: 2,
        max_q: 2,
        ..Default::default()
    })
}

fn forecast_with(kind: ModelKind, data: &PriceSeries, horizon: usize) -> (ForecastResult, usize) {
    fn run<M: ForecastModel>(
        model: M,
        data: &PriceSeries,
        horizon: usize,
    ) -> (ForecastResult, usize) {
        let trained = model.train(data).unwrap();
        let forecast = trained.forecast(horizon).unwrap();
        (forecast, trained.fitted_values().len())
    }

    match kind {
        ModelKind::Arima => run(small_arima(), data, horizon),
        ModelKind::Ets => run(AutoEts::new(), data, horizon),
        ModelKind::HoltWinters => run(HoltWinters::new(7).unwrap(), data, horizon),
        ModelKind::Nnetar => run(small_nnetar(), data, horizon),
        ModelKind::Prophet => run(small_prophet(), data, horizon),
        ModelKind::Naive => run(Naive::new(), data, horizon),
        ModelKind::Combination => unreachable!(),
    }
}

#[rstest]
#[case(ModelKind::Arima)]
#[case(ModelKind::Ets)]
#[case(ModelKind::HoltWinters)]
#[case(ModelKind::Nnetar)]
#[case(ModelKind::Prophet)]
#[case(ModelKind::Naive)]
fn test_forecast_matches_horizon(#[case] kind: ModelKind) {
    let data = sample_series(150, 1);
    let horizon = 30;

    let (forecast, fitted_len) = forecast_with(kind, &data, horizon);

    assert_eq!(forecast.horizons(), horizon);
    assert_eq!(forecast.values().len(), horizon);
    assert_eq!(fitted_len, data.len());
    assert!(forecast.values().iter().all(|v| v.is_finite()));

    assert_eq!(forecast.intervals().len(), 2);
    let inner = forecast.interval(80.0).unwrap();
    let outer = forecast.interval(95.0).unwrap();
    for h in 0..horizon {
        assert!(outer.lower[h] <= inner.lower[h] + 1e-9);
        assert!(inner.upper[h] <= outer.upper[h] + 1e-9);
        assert!(inner.lower[h] <= inner.upper[h]);
    }
}

#[test]
fn test_invalid_level_rejected() {
    let data = sample_series(60, 2);
    let trained = Naive::new().train(&data).unwrap();
    let result = trained.forecast_with_levels(5, &[0.0]);
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_naive_repeats_last_value() {
    let data = sample_series(40, 3);
    let last = *data.values().last().unwrap();
    let forecast = Naive::new().train(&data).unwrap().forecast(4).unwrap();
    assert_eq!(forecast.values(), &[last; 4]);
}

#[test]
fn test_arima_recovers_ar1_coefficient() {
    let mut rng = StdRng::seed_from_u64(11);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let mut values = vec![0.0];
    for _ in 1..600 {
        let prev = *values.last().unwrap();
        values.push(0.6 * prev + noise.sample(&mut rng));
    }

    let model = fit_order(&values, ArimaOrder::new(1, 0, 0), &NelderMeadConfig::default()).unwrap();
    assert_abs_diff_eq!(model.ar_coefficients()[0], 0.6, epsilon = 0.1);
    assert!(model.sigma2() > 0.5 && model.sigma2() < 1.5);
}

#[test]
fn test_auto_arima_names_selected_order() {
    let data = sample_series(200, 4);
    let trained = small_arima().train(&data).unwrap();
    let order = trained.order();

    assert!(order.p <= 2 && order.q <= 2 && order.d <= 2);
    assert_eq!(
        trained.name(),
        format!("ARIMA({},{},{})", order.p, order.d, order.q)
    );
}

#[test]
fn test_arima_rejects_large_d() {
    let data = sample_series(100, 5);
    let model = AutoArima::with_config(ArimaConfig {
        max_d: 3,
        ..Default::default()
    });
    assert!(matches!(model.train(&data), Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_ets_selects_non_seasonal_for_daily_period() {
    let data = sample_series(200, 6);
    let trained = AutoEts::with_config(EtsConfig::default()).train(&data).unwrap();
    let spec = trained.spec().to_string();
    assert!(spec.starts_with("ETS("));
    assert!(spec.ends_with(",N)"));
}

#[test]
fn test_holt_winters_reproduces_exact_pattern() {
    let pattern = [1.0, -1.0, 2.0, -2.0, 0.5, -0.5, 0.0];
    let values: Vec<f64> = (0..70)
        .map(|t| 10.0 + 0.1 * t as f64 + pattern[t % 7])
        .collect();
    let data = PriceSeries::new(forecast_bank::data::daily_dates(origin(), 70), values).unwrap();

    let trained = HoltWinters::new(7).unwrap().train(&data).unwrap();
    let forecast = trained.forecast(14).unwrap();

    for (h, value) in forecast.values().iter().enumerate() {
        let t = 70 + h;
        let expected = 10.0 + 0.1 * t as f64 + pattern[t % 7];
        assert_abs_diff_eq!(*value, expected, epsilon = 1e-6);
    }
}

#[test]
fn test_holt_winters_needs_two_periods() {
    let data = sample_series(14, 7);
    let model = HoltWinters::with_config(HoltWintersConfig {
        period: 7,
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(model.train(&data), Err(ForecastError::ValidationError(_))));
}

#[test]
fn test_nnetar_is_reproducible_with_seed() {
    let data = sample_series(120, 8);
    let a = small_nnetar().train(&data).unwrap().forecast(10).unwrap();
    let b = small_nnetar().train(&data).unwrap().forecast(10).unwrap();

    assert_eq!(a.values(), b.values());
    assert_eq!(a.intervals(), b.intervals());
}

#[test]
fn test_nnetar_name_reports_structure() {
    let data = sample_series(120, 9);
    let model = Nnetar::with_config(NnetarConfig {
        p: Some(2),
        hidden: Some(3),
        period: 7,
        repeats: 2,
        epochs: 20,
        simulation_paths: 10,
        ..Default::default()
    });
    let trained = model.train(&data).unwrap();
    assert_eq!(trained.name(), "NNAR(2,1,3)[7]");
    assert_eq!(trained.lags(), &[1, 2, 7]);
}

#[test]
fn test_prophet_is_reproducible_with_seed() {
    let data = sample_series(150, 10);
    let a = small_prophet().train(&data).unwrap().forecast(20).unwrap();
    let b = small_prophet().train(&data).unwrap().forecast(20).unwrap();
    assert_eq!(a.values(), b.values());
    assert_eq!(a.intervals(), b.intervals());
}

#[test]
fn test_prophet_multiplicative_mode() {
    let data = sample_series(150, 12);
    let model = Prophet::with_config(ProphetConfig {
        mode: SeasonalityMode::Multiplicative,
        n_changepoints: 5,
        uncertainty_samples: 50,
        seasonalities: vec![SeasonalityConfig::new("weekly", 7.0, 3)],
        ..Default::default()
    });
    let trained = model.train(&data).unwrap();
    assert_eq!(trained.mode(), SeasonalityMode::Multiplicative);

    let forecast = trained.forecast(10).unwrap();
    assert!(forecast.values().iter().all(|v| v.is_finite()));
}

#[test]
fn test_prophet_tracks_linear_trend() {
    let values: Vec<f64> = (0..200).map(|t| 5.0 + 0.01 * t as f64).collect();
    let data = PriceSeries::new(forecast_bank::data::daily_dates(origin(), 200), values).unwrap();
    let model = Prophet::with_config(ProphetConfig {
        seasonalities: Vec::new(),
        uncertainty_samples: 0,
        ..Default::default()
    });

    let forecast = model.train(&data).unwrap().forecast(10).unwrap();
    for (h, value) in forecast.values().iter().enumerate() {
        assert_abs_diff_eq!(*value, 5.0 + 0.01 * (200 + h) as f64, epsilon = 1e-3);
    }
    assert!(forecast.intervals().is_empty());
}

#[test]
fn test_combination_is_exact_mean() {
    let data = sample_series(150, 13);
    let horizon = 20;
    let arima = small_arima().train(&data).unwrap().forecast(horizon).unwrap();
    let ets = AutoEts::new().train(&data).unwrap().forecast(horizon).unwrap();
    let hw = HoltWinters::new(7).unwrap().train(&data).unwrap().forecast(horizon).unwrap();
    let nnetar = small_nnetar().train(&data).unwrap().forecast(horizon).unwrap();

    let combination = ForecastCombination::default();
    let combined = combination.combine(&[&arima, &ets, &hw, &nnetar]).unwrap();

    assert_eq!(combined.horizons(), horizon);
    assert!(combined.intervals().is_empty());
    for i in 0..horizon {
        let expected =
            (arima.values()[i] + ets.values()[i] + hw.values()[i] + nnetar.values()[i]) / 4.0;
        assert_eq!(combined.values()[i], expected);
    }
}

#[test]
fn test_combination_validates_members() {
    assert!(ForecastCombination::new(Vec::new()).is_err());
    assert!(ForecastCombination::new(vec![ModelKind::Arima, ModelKind::Arima]).is_err());
    assert!(ForecastCombination::new(vec![ModelKind::Combination]).is_err());

    let combination = ForecastCombination::new(vec![ModelKind::Arima, ModelKind::Prophet]).unwrap();
    assert_eq!(combination.name(), "Combination (ARIMA, Prophet)");

    let single = ForecastResult::new(vec![1.0, 2.0], 2).unwrap();
    assert!(combination.combine(&[&single]).is_err());
}

#[test]
fn test_combined_fitted_values_propagate_gaps() {
    let combination = ForecastCombination::new(vec![ModelKind::Arima, ModelKind::Nnetar]).unwrap();
    let a = [1.0, 2.0, 3.0];
    let b = [f64::NAN, 4.0, 5.0];

    let fitted = combination.combine_fitted(&[&a, &b]).unwrap();
    assert!(fitted[0].is_nan());
    assert_eq!(&fitted[1..], &[3.0, 4.0]);
}
