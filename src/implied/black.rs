//! Black-Scholes pricing and implied volatility inversion.
//!
//! Inversion is a Brent root search of `price(σ) − observed` over a bounded
//! volatility bracket. A price outside the band spanned by the bracket (below
//! intrinsic, or above the price at the vol ceiling) has no sign change and
//! yields [`VolSurfError::VolNotFound`].

use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;

use crate::error::{self, VolSurfError};
use crate::optim::{BrentConfig, RootFailure, brent_root};
use crate::types::{OptionType, Vol};
use crate::validate::{validate_finite, validate_positive};

/// Lower end of the volatility bracket.
pub const MIN_VOL: f64 = 1e-6;

/// Default upper end of the volatility bracket (500% annualized).
pub const DEFAULT_MAX_VOL: f64 = 5.0;

fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Black-Scholes price of a European option with continuous dividend yield.
///
/// Returns 0 when `expiry <= 0` or `vol <= 0`.
///
/// # Examples
/// ```
/// use volsurf_engine::implied::black_scholes_price;
/// use volsurf_engine::OptionType;
///
/// let call = black_scholes_price(100.0, 100.0, 1.0, 0.0, 0.0, 0.2, OptionType::Call);
/// assert!((call - 7.9656).abs() < 1e-3);
/// ```
pub fn black_scholes_price(
    spot: f64,
    strike: f64,
    expiry: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    option_type: OptionType,
) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 {
        return 0.0;
    }
    let sqrt_t = expiry.sqrt();
    let d1 = ((spot / strike).ln() + (rate - dividend_yield + 0.5 * vol * vol) * expiry)
        / (vol * sqrt_t);
    let d2 = d1 - vol * sqrt_t;
    let df_spot = spot * (-dividend_yield * expiry).exp();
    let df_strike = strike * (-rate * expiry).exp();
    match option_type {
        OptionType::Call => df_spot * norm_cdf(d1) - df_strike * norm_cdf(d2),
        OptionType::Put => df_strike * norm_cdf(-d2) - df_spot * norm_cdf(-d1),
    }
}

/// Bracketed implied volatility solver for Black-Scholes prices.
///
/// # Examples
/// ```
/// use volsurf_engine::implied::{black_scholes_price, ImpliedVolSolver};
/// use volsurf_engine::OptionType;
///
/// let solver = ImpliedVolSolver::default();
/// let price = black_scholes_price(100.0, 110.0, 0.5, 0.03, 0.0, 0.25, OptionType::Call);
/// let vol = solver.invert(price, 100.0, 110.0, 0.5, 0.03, OptionType::Call)?;
/// assert!((vol.0 - 0.25).abs() < 1e-8);
/// # Ok::<(), volsurf_engine::VolSurfError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ImpliedVolSolver {
    max_vol: f64,
    config: BrentConfig,
}

impl ImpliedVolSolver {
    /// Create a solver searching `[MIN_VOL, max_vol]`.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] if `max_vol` is not finite or
    /// does not exceed [`MIN_VOL`].
    pub fn new(max_vol: f64) -> error::Result<Self> {
        validate_positive(max_vol, "max_vol")?;
        if max_vol <= MIN_VOL {
            return Err(VolSurfError::InvalidInput {
                message: format!("max_vol must exceed {MIN_VOL}, got {max_vol}"),
            });
        }
        Ok(Self {
            max_vol,
            config: BrentConfig::default(),
        })
    }

    /// Upper end of the search bracket.
    pub fn max_vol(&self) -> f64 {
        self.max_vol
    }

    /// Implied volatility of an option on a non-dividend-paying underlying.
    ///
    /// # Errors
    /// [`VolSurfError::InvalidInput`] for non-positive spot, strike or expiry
    /// and non-finite price or rate; [`VolSurfError::VolNotFound`] when no
    /// root can be bracketed.
    pub fn invert(
        &self,
        price: f64,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        option_type: OptionType,
    ) -> error::Result<Vol> {
        self.invert_with_yield(price, spot, strike, expiry, rate, 0.0, option_type)
    }

    /// Implied volatility with a continuous dividend yield `q`.
    ///
    /// # Errors
    /// Same as [`invert`](Self::invert); `dividend_yield` must be finite.
    #[allow(clippy::too_many_arguments)]
    pub fn invert_with_yield(
        &self,
        price: f64,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        dividend_yield: f64,
        option_type: OptionType,
    ) -> error::Result<Vol> {
        validate_finite(price, "price")?;
        validate_positive(spot, "spot")?;
        validate_positive(strike, "strike")?;
        validate_positive(expiry, "expiry")?;
        validate_finite(rate, "rate")?;
        validate_finite(dividend_yield, "dividend_yield")?;

        let objective = |vol: f64| {
            black_scholes_price(spot, strike, expiry, rate, dividend_yield, vol, option_type)
                - price
        };

        match brent_root(objective, MIN_VOL, self.max_vol, &self.config) {
            Ok(vol) => Ok(Vol(vol)),
            Err(RootFailure::NoBracket { f_lower, f_upper }) => Err(VolSurfError::VolNotFound {
                message: format!(
                    "price {price} outside [{:.6}, {:.6}] for strike {strike}, expiry {expiry}",
                    f_lower + price,
                    f_upper + price
                ),
            }),
            Err(RootFailure::MaxIterations { last }) => Err(VolSurfError::VolNotFound {
                message: format!(
                    "no convergence for strike {strike}, expiry {expiry} (last iterate {last})"
                ),
            }),
        }
    }
}

impl Default for ImpliedVolSolver {
    fn default() -> Self {
        Self {
            max_vol: DEFAULT_MAX_VOL,
            config: BrentConfig::default(),
        }
    }
}
