//! Error types for the surface construction engine.
//!
//! Most failures are absorbed where they occur: a bad quote is dropped, a bad
//! maturity is skipped, and the reason lands in the build diagnostics. Only
//! [`VolSurfError::NoSurvivingMaturities`] aborts a build.

use thiserror::Error;

use crate::types::OptionType;

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, VolSurfError>;

/// Errors that can occur during volatility surface construction and queries.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum VolSurfError {
    /// Input data is invalid (e.g., negative vol, zero expiry, mismatched grid sizes).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Numerical computation failed (e.g., NaN, ill-conditioned data).
    #[error("numerical error: {message}")]
    NumericalError { message: String },

    /// The solver could not bracket an implied volatility for the observed price.
    #[error("implied vol not found: {message}")]
    VolNotFound { message: String },

    /// No quote fell inside the ATM band for this maturity.
    #[error("no quote within ATM band |k| < {atm_epsilon} for expiry {expiry}")]
    AtmMissing { expiry: f64, atm_epsilon: f64 },

    /// One side of the smile has no usable quotes.
    #[error("{branch:?} branch is empty for expiry {expiry}")]
    InsufficientBranch { expiry: f64, branch: OptionType },

    /// Too few grid points survived interpolation for this maturity.
    #[error("expiry {expiry} has {points} grid points, at least {required} required")]
    InsufficientPoints {
        expiry: f64,
        points: usize,
        required: usize,
    },

    /// Maturity is shorter than the configured minimum.
    #[error("expiry {expiry} is below the minimum maturity {min_maturity}")]
    BelowMinMaturity { expiry: f64, min_maturity: f64 },

    /// Smile query outside the observed log-moneyness domain.
    #[error("log-moneyness {log_moneyness} outside observed domain [{lower}, {upper}]")]
    ExtrapolationRefused {
        log_moneyness: f64,
        lower: f64,
        upper: f64,
    },

    /// Every maturity was skipped; no surface can be built.
    #[error("no maturity survived smile construction ({skipped} skipped)")]
    NoSurvivingMaturities { skipped: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_message_accessible() {
        let err = VolSurfError::InvalidInput {
            message: "strike must be positive".into(),
        };
        match &err {
            VolSurfError::InvalidInput { message } => {
                assert!(message.contains("positive"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn error_display_includes_context() {
        let err = VolSurfError::AtmMissing {
            expiry: 0.25,
            atm_epsilon: 0.02,
        };
        let display = format!("{err}");
        assert!(display.contains("0.25"));
        assert!(display.contains("0.02"));

        let err2 = VolSurfError::InsufficientBranch {
            expiry: 0.5,
            branch: OptionType::Put,
        };
        assert!(format!("{err2}").contains("Put"));

        let err3 = VolSurfError::ExtrapolationRefused {
            log_moneyness: 0.7,
            lower: -0.2,
            upper: 0.3,
        };
        assert!(format!("{err3}").contains("0.7"));

        let err4 = VolSurfError::NoSurvivingMaturities { skipped: 3 };
        assert!(format!("{err4}").contains("3 skipped"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VolSurfError>();
    }
}
