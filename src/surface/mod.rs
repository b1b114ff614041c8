//! Multi-maturity volatility surface construction.
//!
//! - [`SurfaceBuilder`] — option quotes → [`SurfaceBuild`] (surface + diagnostics)
//! - [`enforce_calendar`] — running-maximum calendar repair across smiles
//! - [`InterpolatedSurface`] — two-stage PCHIP query surface
//! - [`SurfaceGrid`] — materialized, hull-masked grid with optional blur

pub mod arbitrage;
pub mod builder;
pub mod grid;
pub mod hull;
pub mod nodal;

pub use arbitrage::{CalendarViolation, enforce_calendar};
pub use builder::{BuildDiagnostics, SkippedMaturity, SmileArbitrage, SurfaceBuild, SurfaceBuilder};
pub use grid::{GridPoint, SurfaceGrid};
pub use hull::ConvexHull;
pub use nodal::InterpolatedSurface;

use crate::error;
use crate::types::{Variance, Vol};

/// A volatility surface: (log-moneyness, expiry) → vol.
///
/// Implementations are immutable after construction and must be
/// `Send + Sync`, so a surface can be shared via `Arc<dyn VolSurface>`.
pub trait VolSurface: Send + Sync + std::fmt::Debug {
    /// Black implied volatility at `log_moneyness = ln(K/F)` and `expiry`
    /// in years. Zero for a non-positive expiry.
    fn black_vol(&self, log_moneyness: f64, expiry: f64) -> error::Result<Vol>;

    /// Total variance σ²·T.
    fn black_variance(&self, log_moneyness: f64, expiry: f64) -> error::Result<Variance>;

    /// Maturities the surface was built from, ascending.
    fn tenors(&self) -> &[f64];
}
