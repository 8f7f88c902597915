use forecast_bank::error::ForecastError;
use series_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match ForecastError::from(io_error) {
        ForecastError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let math_error = MathError::InsufficientData("need 3 values".to_string());
    match ForecastError::from(math_error.clone()) {
        ForecastError::MathError(inner) => assert_eq!(inner, math_error),
        other => panic!("Expected MathError variant, got {:?}", other),
    }

    let toml_error = toml::from_str::<toml::Table>("not = = toml").unwrap_err();
    match ForecastError::from(toml_error) {
        ForecastError::ConfigError(_) => {}
        other => panic!("Expected ConfigError variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    match ForecastError::from(json_error) {
        ForecastError::SerializationError(_) => {}
        other => panic!("Expected SerializationError variant, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let error = ForecastError::InvalidParameter("period must be at least 2".to_string());
    assert_eq!(error.to_string(), "Invalid parameter: period must be at least 2");

    let error = ForecastError::from(io::Error::new(
        io::ErrorKind::PermissionDenied,
        "permission denied",
    ));
    let text = error.to_string();
    assert!(text.contains("IO error"));
    assert!(text.contains("permission denied"));

    let error = ForecastError::from(MathError::CalculationError("singular".to_string()));
    assert!(error.to_string().contains("singular"));
}

#[test]
fn test_error_variants_are_distinct() {
    let errors = [
        ForecastError::DataError("gap".to_string()),
        ForecastError::ForecastingError("diverged".to_string()),
        ForecastError::ValidationError("horizon".to_string()),
        ForecastError::ConfigError("members".to_string()),
    ];
    let prefixes = ["Data error", "Forecasting error", "Validation error", "Config error"];

    for (error, prefix) in errors.iter().zip(prefixes) {
        assert!(error.to_string().starts_with(prefix));
    }
}
