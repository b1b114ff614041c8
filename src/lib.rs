//! # volsurf-engine
//!
//! Non-parametric implied volatility surface construction from listed option
//! quotes.
//!
//! The pipeline: raw quotes → admission filters → implied vol inversion →
//! ATM-anchored, put/call blended smiles → shape-preserving total-variance
//! grids → calendar-arbitrage repair → a continuous
//! `(log_moneyness, maturity) → vol` surface.
//!
//! ## Architecture
//!
//! - **`implied`** — Black-Scholes pricing and Brent-based implied vol inversion
//! - **`market`** — Quotes, admission filters, market snapshot
//! - **`smile`** — Per-maturity smile building, butterfly diagnostics, PCHIP interpolation
//! - **`surface`** — Calendar repair, query surface, materialized grid, end-to-end builder
//! - **`config`** — The single [`EngineConfig`] threaded through every stage
//!
//! ## Design
//!
//! - **Newtypes for outputs, bare `f64` for inputs.** [`Vol`] and [`Variance`]
//!   wrap return values to prevent accidental mixing.
//! - **No panics.** Every fallible operation returns [`Result`]. Library code
//!   never calls `unwrap()` or `expect()`.
//! - **Absorb, don't abort.** A bad quote or maturity is dropped and recorded in
//!   [`surface::BuildDiagnostics`]; only a build with no surviving maturity fails.
//! - **Immutable stages.** Each stage returns a new value and never mutates its
//!   input.
//! - **Thread-safe.** Surfaces are `Send + Sync`; with the `parallel` feature
//!   maturities are built on rayon's pool.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use volsurf_engine::implied::black_scholes_price;
//! use volsurf_engine::market::OptionQuote;
//! use volsurf_engine::{OptionType, SurfaceBuilder, VolSurface};
//!
//! let valuation = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
//! let t = (expiry - valuation).num_days() as f64 / 365.0;
//!
//! let quotes: Vec<OptionQuote> = [85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 115.0]
//!     .iter()
//!     .flat_map(|&strike| {
//!         [OptionType::Call, OptionType::Put].map(|option_type| {
//!             let p = black_scholes_price(100.0, strike, t, 0.01, 0.0, 0.25, option_type);
//!             OptionQuote {
//!                 strike, option_type, bid: p * 0.99, ask: p * 1.01,
//!                 volume: 5, open_interest: 20, expiry, valuation_date: valuation,
//!             }
//!         })
//!     })
//!     .collect();
//!
//! let build = SurfaceBuilder::new().spot(100.0).rate(0.01).quotes(quotes).build()?;
//! let vol = build.surface.black_vol(0.0, t)?;
//! assert!((vol.0 - 0.25).abs() < 1e-3);
//! # Ok::<(), volsurf_engine::VolSurfError>(())
//! ```

pub mod config;
pub mod conventions;
pub mod error;
pub mod implied;
pub(crate) mod interp;
pub mod market;
mod optim;
pub mod smile;
pub mod surface;
pub mod types;
mod validate;

#[doc(inline)]
pub use config::EngineConfig;
#[doc(inline)]
pub use error::{Result, VolSurfError};
#[doc(inline)]
pub use market::{MarketSnapshot, OptionQuote};
#[doc(inline)]
pub use surface::{SurfaceBuild, SurfaceBuilder, VolSurface};
#[doc(inline)]
pub use types::{OptionType, Variance, Vol};
