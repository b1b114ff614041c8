//! Per-maturity smile construction from raw call and put quotes.
//!
//! Puts and calls are quoted independently and typically disagree by a
//! bid/ask-sized offset near the money. The builder anchors both branches to
//! one open-interest-weighted ATM vol, then crossfades between them across a
//! band around the forward:
//!
//! ```text
//! weight(k) = ½·(1 + tanh(k / w))
//! σ(k)      = (1 − weight(k))·σ_put(k) + weight(k)·σ_call(k),   |k| ≤ w
//! ```
//!
//! Outside the band the put wing (k < −w) and call wing (k > w) are kept as is.

use crate::config::EngineConfig;
use crate::conventions::{log_moneyness, strike_from_log_moneyness};
use crate::error::{self, VolSurfError};
use crate::implied::ImpliedVolSolver;
use crate::interp::{Linear, collapse_duplicates, linspace};
use crate::market::{MarketParams, OptionQuote, QuoteRejection, RejectedQuote};
use crate::smile::{Smile, SmilePoint};
use crate::types::OptionType;
use crate::validate::validate_positive;

/// A built smile together with the quotes that were dropped on the way.
#[derive(Debug, Clone)]
pub struct SmileBuild {
    pub smile: Smile,
    pub rejected: Vec<RejectedQuote>,
}

/// An inverted quote.
#[derive(Debug, Clone, Copy)]
struct VolPoint {
    option_type: OptionType,
    log_moneyness: f64,
    vol: f64,
    open_interest: u64,
}

/// Builds ATM-anchored, put/call blended smiles.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use volsurf_engine::implied::black_scholes_price;
/// use volsurf_engine::market::{MarketParams, OptionQuote};
/// use volsurf_engine::smile::SmileBuilder;
/// use volsurf_engine::{EngineConfig, OptionType};
///
/// let valuation = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
/// let expiry = NaiveDate::from_ymd_opt(2026, 7, 3).unwrap();
/// let market = MarketParams { spot: 100.0, rate: 0.0, dividend_yield: 0.0 };
/// let t = 0.5;
///
/// let mut quotes = Vec::new();
/// for strike in [80.0, 90.0, 100.0, 110.0, 120.0] {
///     for option_type in [OptionType::Call, OptionType::Put] {
///         let p = black_scholes_price(100.0, strike, t, 0.0, 0.0, 0.2, option_type);
///         quotes.push(OptionQuote {
///             strike, option_type, bid: p, ask: p, volume: 10, open_interest: 100,
///             expiry, valuation_date: valuation,
///         });
///     }
/// }
///
/// let config = EngineConfig::default();
/// let built = SmileBuilder::new(&config)?.build(&quotes, market, 100.0, t)?;
/// assert!((built.smile.atm_vol() - 0.2).abs() < 1e-6);
/// # Ok::<(), volsurf_engine::VolSurfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SmileBuilder<'a> {
    config: &'a EngineConfig,
    solver: ImpliedVolSolver,
}

impl<'a> SmileBuilder<'a> {
    /// Create a builder whose solver searches up to `config.max_implied_vol`.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] for an unusable vol ceiling.
    pub fn new(config: &'a EngineConfig) -> error::Result<Self> {
        Ok(Self {
            config,
            solver: ImpliedVolSolver::new(config.max_implied_vol)?,
        })
    }

    /// Build the smile for one maturity.
    ///
    /// Quotes below intrinsic or without an implied vol are dropped and
    /// returned in [`SmileBuild::rejected`].
    ///
    /// # Errors
    /// - [`VolSurfError::InvalidInput`] for a non-positive forward or expiry.
    /// - [`VolSurfError::AtmMissing`] when no inverted quote lies inside the ATM band.
    /// - [`VolSurfError::InsufficientBranch`] when puts or calls are missing.
    pub fn build(
        &self,
        quotes: &[OptionQuote],
        market: MarketParams,
        forward: f64,
        expiry: f64,
    ) -> error::Result<SmileBuild> {
        let (smile, rejected) = self.build_with_rejections(quotes, market, forward, expiry);
        Ok(SmileBuild {
            smile: smile?,
            rejected,
        })
    }

    /// Like [`build`](Self::build), but hands back the rejected quotes even
    /// when the smile itself cannot be built.
    pub fn build_with_rejections(
        &self,
        quotes: &[OptionQuote],
        market: MarketParams,
        forward: f64,
        expiry: f64,
    ) -> (error::Result<Smile>, Vec<RejectedQuote>) {
        if let Err(e) =
            validate_positive(forward, "forward").and_then(|_| validate_positive(expiry, "expiry"))
        {
            return (Err(e), Vec::new());
        }
        let (points, rejected) = self.invert_quotes(quotes, market, forward, expiry);
        (self.assemble(&points, forward, expiry), rejected)
    }

    /// Steps 4–7: anchor, align, blend and stitch.
    fn assemble(&self, points: &[VolPoint], forward: f64, expiry: f64) -> error::Result<Smile> {
        let atm_vol = self.atm_vol(points, expiry)?;

        let puts = branch(points, OptionType::Put, atm_vol, expiry)?;
        let calls = branch(points, OptionType::Call, atm_vol, expiry)?;

        let w = self.config.blend_width;
        let mut stitched: Vec<(f64, f64)> = puts
            .0
            .iter()
            .zip(&puts.1)
            .filter(|&(&k, _)| k < -w)
            .map(|(&k, &v)| (k, v))
            .collect();
        stitched.extend(blend(&puts, &calls, w, self.config.blend_samples)?);
        stitched.extend(
            calls
                .0
                .iter()
                .zip(&calls.1)
                .filter(|&(&k, _)| k > w)
                .map(|(&k, &v)| (k, v)),
        );

        let before = stitched.len();
        // A shifted or extrapolated vol can cross zero; it has no variance meaning.
        stitched.retain(|&(_, v)| v > 0.0 && v.is_finite());
        #[cfg(feature = "logging")]
        if stitched.len() < before {
            tracing::debug!(
                expiry,
                dropped = before - stitched.len(),
                "non-positive vols dropped after alignment"
            );
        }
        #[cfg(not(feature = "logging"))]
        let _ = before;

        let smile_points = stitched
            .into_iter()
            .map(|(k, vol)| SmilePoint {
                log_moneyness: k,
                vol,
                strike: strike_from_log_moneyness(k, forward),
            })
            .collect();
        Smile::new(expiry, forward, atm_vol, smile_points)
    }

    /// Steps 1–3: intrinsic filter, inversion, log-moneyness.
    fn invert_quotes(
        &self,
        quotes: &[OptionQuote],
        market: MarketParams,
        forward: f64,
        expiry: f64,
    ) -> (Vec<VolPoint>, Vec<RejectedQuote>) {
        let mut points = Vec::with_capacity(quotes.len());
        let mut rejected = Vec::new();

        for quote in quotes {
            let mid = quote.mid();
            let intrinsic = quote.intrinsic(market.spot);
            if mid < intrinsic {
                rejected.push(RejectedQuote {
                    quote: quote.clone(),
                    reason: QuoteRejection::BelowIntrinsic { mid, intrinsic },
                });
                continue;
            }

            match self.solver.invert_with_yield(
                mid,
                market.spot,
                quote.strike,
                expiry,
                market.rate,
                market.dividend_yield,
                quote.option_type,
            ) {
                Ok(vol) => points.push(VolPoint {
                    option_type: quote.option_type,
                    log_moneyness: log_moneyness(quote.strike, forward),
                    vol: vol.0,
                    open_interest: quote.open_interest,
                }),
                Err(_) => rejected.push(RejectedQuote {
                    quote: quote.clone(),
                    reason: QuoteRejection::VolNotFound { mid },
                }),
            }
        }

        (points, rejected)
    }

    /// Step 4: open-interest-weighted mean vol inside `|k| < atm_epsilon`.
    fn atm_vol(&self, points: &[VolPoint], expiry: f64) -> error::Result<f64> {
        let eps = self.config.atm_epsilon;
        let band: Vec<&VolPoint> = points.iter().filter(|p| p.log_moneyness.abs() < eps).collect();
        if band.is_empty() {
            return Err(VolSurfError::AtmMissing {
                expiry,
                atm_epsilon: eps,
            });
        }

        let total_oi: f64 = band.iter().map(|p| p.open_interest as f64).sum();
        let atm = if total_oi > 0.0 {
            band.iter().map(|p| p.open_interest as f64 * p.vol).sum::<f64>() / total_oi
        } else {
            band.iter().map(|p| p.vol).sum::<f64>() / band.len() as f64
        };
        Ok(atm)
    }
}

/// Step 5: one branch, sorted and de-duplicated, shifted so that its point
/// nearest the money sits at `atm_vol`.
fn branch(
    points: &[VolPoint],
    option_type: OptionType,
    atm_vol: f64,
    expiry: f64,
) -> error::Result<(Vec<f64>, Vec<f64>)> {
    let raw: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| p.option_type == option_type)
        .map(|p| (p.log_moneyness, p.vol))
        .collect();
    if raw.is_empty() {
        return Err(VolSurfError::InsufficientBranch {
            expiry,
            branch: option_type,
        });
    }

    let (ks, vols) = collapse_duplicates(raw);
    let mut nearest = 0;
    for (i, k) in ks.iter().enumerate() {
        if k.abs() < ks[nearest].abs() {
            nearest = i;
        }
    }
    let shift = atm_vol - vols[nearest];
    let vols = vols.into_iter().map(|v| v + shift).collect();
    Ok((ks, vols))
}

/// Step 6: logistic crossfade of the two aligned branches over `[−w, w]`.
fn blend(
    puts: &(Vec<f64>, Vec<f64>),
    calls: &(Vec<f64>, Vec<f64>),
    w: f64,
    samples: usize,
) -> error::Result<Vec<(f64, f64)>> {
    let put_curve = Linear::new(puts.0.clone(), puts.1.clone())?;
    let call_curve = Linear::new(calls.0.clone(), calls.1.clone())?;
    Ok(linspace(-w, w, samples)
        .into_iter()
        .map(|k| {
            let weight = 0.5 * (1.0 + (k / w).tanh());
            (k, (1.0 - weight) * put_curve.value(k) + weight * call_curve.value(k))
        })
        .collect())
}
