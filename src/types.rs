//! Core domain types for volatility surface construction.
//!
//! **Outputs use newtypes** — [`Vol`] and [`Variance`] wrap return values so
//! callers can't accidentally mix a volatility with a total variance.
//! **Inputs use bare `f64`**; parameter names carry the meaning.
//!
//! These types wrap `f64`, which has no total order, so only `PartialEq` and
//! `PartialOrd` are derived.

use serde::{Deserialize, Serialize};

/// Implied volatility `σ`, measured as annualized standard deviation.
///
/// # Examples
/// ```
/// use volsurf_engine::types::Vol;
/// let vol = Vol(0.20);
/// assert_eq!(vol.0, 0.20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Vol(pub f64);

/// Total variance `σ²T`.
///
/// Cross-tenor work is done in total variance because it must be
/// non-decreasing in time for a calendar-arbitrage-free surface.
///
/// # Examples
/// ```
/// use volsurf_engine::types::Variance;
/// let var = Variance(0.04); // 20% vol over one year
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Variance(pub f64);

/// Option type: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Right to buy at strike price.
    Call,
    /// Right to sell at strike price.
    Put,
}

impl OptionType {
    /// Payoff at immediate exercise against `spot`.
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }
}
