//! # Forecast Bank Workspace
//!
//! Daily log-price forecasting comparison. The models, data handling and
//! reporting live in [`forecast_bank`]; the numerical routines they share
//! live in [`series_math`].
//!
//! ## Example
//!
//! ```
//! use forecast_bank_workspace::forecast_bank::metrics::root_mean_squared_error;
//!
//! let actual = [7.1, 7.2, 7.15];
//! assert_eq!(root_mean_squared_error(&actual, &actual).unwrap(), 0.0);
//! ```

pub use forecast_bank;
pub use series_math;
