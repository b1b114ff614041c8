//! End-to-end surface construction from raw option quotes.
//!
//! ```text
//! quotes ─► admission ─► group by expiry ─┬─► smile ─► interpolate ─┐
//!                                         ├─► smile ─► interpolate ─┤ (parallel)
//!                                         └─► ...                   ┘
//!                                                  │
//!                               calendar enforcement (barrier)
//!                                                  │
//!                                        InterpolatedSurface
//! ```
//!
//! Failures are absorbed at the level they occur. A bad quote is recorded in
//! [`BuildDiagnostics::rejected_quotes`], a maturity that cannot produce a
//! usable smile in [`BuildDiagnostics::skipped_maturities`]. Only a build in
//! which no maturity survives fails.
//!
//! ```
//! use chrono::NaiveDate;
//! use volsurf_engine::implied::black_scholes_price;
//! use volsurf_engine::market::OptionQuote;
//! use volsurf_engine::surface::{SurfaceBuilder, VolSurface};
//! use volsurf_engine::OptionType;
//!
//! let valuation = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let mut quotes = Vec::new();
//! for days in [73_i64, 182] {
//!     let expiry = valuation + chrono::Days::new(days as u64);
//!     let t = days as f64 / 365.0;
//!     for strike in [80.0, 90.0, 95.0, 100.0, 105.0, 110.0, 120.0] {
//!         for option_type in [OptionType::Call, OptionType::Put] {
//!             let p = black_scholes_price(100.0, strike, t, 0.0, 0.0, 0.2, option_type);
//!             quotes.push(OptionQuote {
//!                 strike, option_type, bid: p, ask: p, volume: 10, open_interest: 50,
//!                 expiry, valuation_date: valuation,
//!             });
//!         }
//!     }
//! }
//!
//! let build = SurfaceBuilder::new().spot(100.0).rate(0.0).quotes(quotes).build()?;
//! let vol = build.surface.black_vol(0.0, 0.3)?;
//! assert!((vol.0 - 0.2).abs() < 1e-4);
//! # Ok::<(), volsurf_engine::VolSurfError>(())
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::conventions::year_fraction;
use crate::error::{self, VolSurfError};
use crate::market::{MarketParams, MarketSnapshot, OptionQuote, RejectedQuote, clean_quotes, group_by_expiry};
use crate::smile::{ArbitrageReport, InterpolatedSmile, Smile, SmileBuilder, interpolate};
use crate::surface::arbitrage::{CalendarViolation, enforce_calendar};
use crate::surface::grid::SurfaceGrid;
use crate::surface::nodal::InterpolatedSurface;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A maturity that did not make it into the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMaturity {
    pub expiry_date: NaiveDate,
    /// Year fraction to expiry.
    pub expiry: f64,
    pub reason: VolSurfError,
}

/// Butterfly diagnostic for one surviving smile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmileArbitrage {
    pub expiry: f64,
    pub report: ArbitrageReport,
}

/// Everything the build dropped, corrected or flagged.
#[derive(Debug, Clone, Default)]
pub struct BuildDiagnostics {
    pub rejected_quotes: Vec<RejectedQuote>,
    pub skipped_maturities: Vec<SkippedMaturity>,
    pub butterfly: Vec<SmileArbitrage>,
    pub calendar_violations: Vec<CalendarViolation>,
}

impl BuildDiagnostics {
    /// No butterfly or calendar violation was found.
    pub fn is_arbitrage_free(&self) -> bool {
        self.calendar_violations.is_empty() && self.butterfly.iter().all(|b| b.report.is_free)
    }
}

/// Output of [`SurfaceBuilder::build`].
#[derive(Debug, Clone)]
pub struct SurfaceBuild {
    pub surface: InterpolatedSurface,
    /// Blended smiles of the surviving maturities, ascending.
    pub smiles: Vec<Smile>,
    /// Calendar-corrected total-variance grids, ascending.
    pub interpolated: Vec<InterpolatedSmile>,
    pub diagnostics: BuildDiagnostics,
    config: EngineConfig,
}

impl SurfaceBuild {
    /// Materialize the surface on the configured grid.
    ///
    /// # Errors
    /// See [`InterpolatedSurface::grid`].
    pub fn grid(&self) -> error::Result<SurfaceGrid> {
        self.surface.grid(&self.config.surface_grid)
    }
}

/// One maturity's worth of work.
struct MaturityOutcome {
    expiry_date: NaiveDate,
    expiry: f64,
    rejected: Vec<RejectedQuote>,
    result: error::Result<(Smile, InterpolatedSmile)>,
}

/// Builder for surfaces from a chain of option quotes.
///
/// Spot and rate are required; the dividend yield defaults to zero and the
/// configuration to [`EngineConfig::default`].
#[derive(Debug, Default)]
pub struct SurfaceBuilder {
    spot: Option<f64>,
    rate: Option<f64>,
    dividend_yield: Option<f64>,
    config: EngineConfig,
    quotes: Vec<OptionQuote>,
}

impl SurfaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a market snapshot.
    pub fn from_snapshot(snapshot: MarketSnapshot) -> Self {
        Self {
            spot: Some(snapshot.spot),
            rate: Some(snapshot.rate),
            dividend_yield: Some(snapshot.dividend_yield),
            config: EngineConfig::default(),
            quotes: snapshot.quotes,
        }
    }

    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    /// Continuously compounded risk-free rate.
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Continuous dividend yield q; forwards become `S · exp((r − q) · T)`.
    pub fn dividend_yield(mut self, q: f64) -> Self {
        self.dividend_yield = Some(q);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the quote set.
    pub fn quotes(mut self, quotes: Vec<OptionQuote>) -> Self {
        self.quotes = quotes;
        self
    }

    /// Append one quote.
    pub fn add_quote(mut self, quote: OptionQuote) -> Self {
        self.quotes.push(quote);
        self
    }

    /// Run the pipeline.
    ///
    /// # Errors
    /// - [`VolSurfError::InvalidInput`] for a missing or invalid spot or rate,
    ///   an invalid configuration, or no quotes.
    /// - [`VolSurfError::NoSurvivingMaturities`] when every maturity is skipped.
    pub fn build(self) -> error::Result<SurfaceBuild> {
        let spot = self.spot.ok_or_else(|| VolSurfError::InvalidInput {
            message: "spot price is required".into(),
        })?;
        let rate = self.rate.ok_or_else(|| VolSurfError::InvalidInput {
            message: "risk-free rate is required".into(),
        })?;
        let q = self.dividend_yield.unwrap_or(0.0);
        let config = self.config;
        config.validate()?;
        let snapshot = MarketSnapshot::new(spot, rate, q, self.quotes)?;
        let market = snapshot.params();

        #[cfg(feature = "logging")]
        tracing::debug!(
            quotes = snapshot.quotes.len(),
            spot,
            rate,
            dividend_yield = q,
            "surface build started"
        );

        let (admitted, mut rejected_quotes) = clean_quotes(&snapshot.quotes, &config);
        let groups: Vec<((NaiveDate, NaiveDate), Vec<OptionQuote>)> =
            group_by_expiry(admitted).into_iter().collect();

        let smile_builder = SmileBuilder::new(&config)?;
        let process = |((expiry_date, valuation_date), quotes): &((NaiveDate, NaiveDate), Vec<OptionQuote>)| {
            build_maturity(
                &smile_builder,
                &config,
                market,
                *expiry_date,
                *valuation_date,
                quotes,
            )
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<MaturityOutcome> = groups.par_iter().map(process).collect();
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<MaturityOutcome> = groups.iter().map(process).collect();

        let mut survivors: Vec<(NaiveDate, Smile, InterpolatedSmile)> = Vec::new();
        let mut skipped_maturities = Vec::new();
        for outcome in outcomes {
            rejected_quotes.extend(outcome.rejected);
            match outcome.result {
                Ok((smile, interpolated)) => survivors.push((outcome.expiry_date, smile, interpolated)),
                Err(reason) => skipped_maturities.push(SkippedMaturity {
                    expiry_date: outcome.expiry_date,
                    expiry: outcome.expiry,
                    reason,
                }),
            }
        }

        survivors.sort_by(|a, b| a.2.expiry().total_cmp(&b.2.expiry()));
        // Two expiry dates can share a year fraction when valuation dates differ.
        let mut unique: Vec<(NaiveDate, Smile, InterpolatedSmile)> = Vec::with_capacity(survivors.len());
        for survivor in survivors {
            match unique.last() {
                Some(last) if last.2.expiry() == survivor.2.expiry() => {
                    skipped_maturities.push(SkippedMaturity {
                        expiry_date: survivor.0,
                        expiry: survivor.2.expiry(),
                        reason: VolSurfError::InvalidInput {
                            message: format!("maturity {} already built", survivor.2.expiry()),
                        },
                    });
                }
                _ => unique.push(survivor),
            }
        }
        skipped_maturities.sort_by_key(|s| s.expiry_date);

        if unique.is_empty() {
            #[cfg(feature = "logging")]
            tracing::debug!(skipped = skipped_maturities.len(), "no maturity survived");
            return Err(VolSurfError::NoSurvivingMaturities {
                skipped: skipped_maturities.len(),
            });
        }

        let (smiles, interpolated): (Vec<Smile>, Vec<InterpolatedSmile>) =
            unique.into_iter().map(|(_, s, i)| (s, i)).unzip();
        let butterfly = smiles
            .iter()
            .map(|s| SmileArbitrage {
                expiry: s.expiry(),
                report: s.butterfly_report(),
            })
            .collect();

        let (interpolated, calendar_violations) = enforce_calendar(interpolated)?;
        let surface = InterpolatedSurface::new(interpolated.clone(), config.max_implied_vol)?;

        #[cfg(feature = "logging")]
        tracing::info!(
            maturities = smiles.len(),
            skipped = skipped_maturities.len(),
            rejected_quotes = rejected_quotes.len(),
            calendar_corrections = calendar_violations.len(),
            "surface build complete"
        );

        Ok(SurfaceBuild {
            surface,
            smiles,
            interpolated,
            diagnostics: BuildDiagnostics {
                rejected_quotes,
                skipped_maturities,
                butterfly,
                calendar_violations,
            },
            config,
        })
    }
}

fn build_maturity(
    smile_builder: &SmileBuilder<'_>,
    config: &EngineConfig,
    market: MarketParams,
    expiry_date: NaiveDate,
    valuation_date: NaiveDate,
    quotes: &[OptionQuote],
) -> MaturityOutcome {
    let expiry = year_fraction(valuation_date, expiry_date, config.day_count_basis);
    if expiry <= 0.0 {
        return MaturityOutcome {
            expiry_date,
            expiry,
            rejected: Vec::new(),
            result: Err(VolSurfError::BelowMinMaturity {
                expiry,
                min_maturity: config.min_maturity,
            }),
        };
    }

    let forward = market.forward(expiry);
    let (smile, rejected) = smile_builder.build_with_rejections(quotes, market, forward, expiry);
    let result = smile.and_then(|smile| {
        let interpolated = interpolate(&smile, &config.moneyness_grid, config.variance_floor)?;
        interpolated.check_admissible(config)?;
        Ok((smile, interpolated))
    });

    #[cfg(feature = "logging")]
    match &result {
        Ok((smile, _)) => tracing::debug!(
            %expiry_date,
            expiry,
            forward,
            atm_vol = smile.atm_vol(),
            points = smile.points().len(),
            "maturity built"
        ),
        Err(reason) => tracing::debug!(%expiry_date, expiry, %reason, "maturity skipped"),
    }

    MaturityOutcome {
        expiry_date,
        expiry,
        rejected,
        result,
    }
}
