//! # Series Math
//!
//! Numerical building blocks shared by the forecasting models:
//! derivative-free optimisation, differencing, stationarity testing,
//! autocorrelation and regularised least squares.

use thiserror::Error;

pub mod autocorrelation;
pub mod descriptive;
pub mod differencing;
pub mod linalg;
pub mod optimization;
pub mod stationarity;

pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};

/// Errors that can occur in numerical routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
