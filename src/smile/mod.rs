//! Single-maturity volatility smiles.
//!
//! A smile represents how implied volatility varies with log-moneyness at a
//! fixed expiry.
//!
//! - [`SmileBuilder`] — quotes → ATM-anchored, put/call blended [`Smile`]
//! - [`interpolate`] — [`Smile`] → gridded total variance ([`InterpolatedSmile`])
//! - [`check_butterfly`] — convexity diagnostic on a smile

pub mod arbitrage;
pub mod builder;
pub mod interpolated;

pub use arbitrage::{ArbitrageReport, ButterflyViolation, check_butterfly};
pub use builder::{SmileBuild, SmileBuilder};
pub use interpolated::{InterpolatedSmile, interpolate};

use serde::{Deserialize, Serialize};

use crate::error::{self, VolSurfError};
use crate::interp::collapse_duplicates;
use crate::validate::validate_positive;

/// One observation on a smile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmilePoint {
    /// ln(K / F).
    pub log_moneyness: f64,
    /// Black implied volatility.
    pub vol: f64,
    pub strike: f64,
}

/// Implied volatility curve for one maturity, strictly increasing in
/// log-moneyness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Smile {
    expiry: f64,
    forward: f64,
    atm_vol: f64,
    points: Vec<SmilePoint>,
}

impl Smile {
    /// Create a smile, sorting points and averaging duplicate log-moneyness.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] for an empty point set,
    /// non-finite points, or a non-positive expiry or forward.
    pub fn new(
        expiry: f64,
        forward: f64,
        atm_vol: f64,
        points: Vec<SmilePoint>,
    ) -> error::Result<Self> {
        validate_positive(expiry, "expiry")?;
        validate_positive(forward, "forward")?;
        if points.is_empty() {
            return Err(VolSurfError::InvalidInput {
                message: format!("smile for expiry {expiry} has no points"),
            });
        }
        if points
            .iter()
            .any(|p| !p.log_moneyness.is_finite() || !p.vol.is_finite() || !p.strike.is_finite())
        {
            return Err(VolSurfError::InvalidInput {
                message: format!("smile for expiry {expiry} contains non-finite points"),
            });
        }

        let (ks, vols) =
            collapse_duplicates(points.iter().map(|p| (p.log_moneyness, p.vol)).collect());
        let (_, strikes) =
            collapse_duplicates(points.iter().map(|p| (p.log_moneyness, p.strike)).collect());
        let points = ks
            .into_iter()
            .zip(vols)
            .zip(strikes)
            .map(|((log_moneyness, vol), strike)| SmilePoint {
                log_moneyness,
                vol,
                strike,
            })
            .collect();

        Ok(Self {
            expiry,
            forward,
            atm_vol,
            points,
        })
    }

    /// Time to expiry in years.
    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    pub fn forward(&self) -> f64 {
        self.forward
    }

    /// The open-interest-weighted ATM vol both branches were anchored to.
    pub fn atm_vol(&self) -> f64 {
        self.atm_vol
    }

    pub fn points(&self) -> &[SmilePoint] {
        &self.points
    }

    pub fn log_moneyness(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.log_moneyness).collect()
    }

    pub fn vols(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.vol).collect()
    }

    /// The point closest to log-moneyness zero.
    pub fn atm_point(&self) -> &SmilePoint {
        let mut best = &self.points[0];
        for p in &self.points[1..] {
            if p.log_moneyness.abs() < best.log_moneyness.abs() {
                best = p;
            }
        }
        best
    }

    /// Butterfly (convexity) diagnostic for this smile.
    pub fn butterfly_report(&self) -> ArbitrageReport {
        check_butterfly(&self.log_moneyness(), &self.vols())
    }
}
