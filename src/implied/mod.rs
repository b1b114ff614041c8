//! Implied volatility extraction from option prices.
//!
//! - [`black_scholes_price`] — closed-form European price
//! - [`ImpliedVolSolver`] — Brent inversion over a bounded vol bracket

pub mod black;

pub use black::{DEFAULT_MAX_VOL, ImpliedVolSolver, MIN_VOL, black_scholes_price};
