//! Option quotes and the market snapshot they are built from.
//!
//! Quotes are admitted once, never modified, and grouped by expiry date for
//! per-maturity smile construction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::conventions::forward_price;
use crate::error::{self, VolSurfError};
use crate::types::OptionType;
use crate::validate::{validate_finite, validate_positive};

/// A single listed option quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    pub option_type: OptionType,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub expiry: NaiveDate,
    pub valuation_date: NaiveDate,
}

impl OptionQuote {
    /// Mid price `(bid + ask) / 2`.
    pub fn mid(&self) -> f64 {
        0.5 * (self.bid + self.ask)
    }

    /// Payoff at immediate exercise against `spot`.
    pub fn intrinsic(&self, spot: f64) -> f64 {
        self.option_type.intrinsic(spot, self.strike)
    }
}

/// Why a quote was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
pub enum QuoteRejection {
    #[error("strike {0} is not positive")]
    NonPositiveStrike(f64),
    #[error("bid {0} is not positive")]
    NonPositiveBid(f64),
    #[error("ask {0} is not positive")]
    NonPositiveAsk(f64),
    #[error("volume {volume} below minimum {min}")]
    BelowMinVolume { volume: u64, min: u64 },
    #[error("open interest {open_interest} below minimum {min}")]
    BelowMinOpenInterest { open_interest: u64, min: u64 },
    #[error("mid {mid} below intrinsic value {intrinsic}")]
    BelowIntrinsic { mid: f64, intrinsic: f64 },
    #[error("no implied volatility for mid {mid}")]
    VolNotFound { mid: f64 },
}

/// A quote that did not make it into a smile, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedQuote {
    pub quote: OptionQuote,
    pub reason: QuoteRejection,
}

/// Check a quote against the admission filters.
///
/// # Errors
/// The first failing filter, as a [`QuoteRejection`].
pub fn admit(quote: &OptionQuote, config: &EngineConfig) -> Result<(), QuoteRejection> {
    // NaN fails every `> 0.0` test and is rejected here.
    if !(quote.strike > 0.0 && quote.strike.is_finite()) {
        return Err(QuoteRejection::NonPositiveStrike(quote.strike));
    }
    if !(quote.bid > 0.0 && quote.bid.is_finite()) {
        return Err(QuoteRejection::NonPositiveBid(quote.bid));
    }
    if !(quote.ask > 0.0 && quote.ask.is_finite()) {
        return Err(QuoteRejection::NonPositiveAsk(quote.ask));
    }
    if quote.volume < config.min_volume {
        return Err(QuoteRejection::BelowMinVolume {
            volume: quote.volume,
            min: config.min_volume,
        });
    }
    if quote.open_interest < config.min_open_interest {
        return Err(QuoteRejection::BelowMinOpenInterest {
            open_interest: quote.open_interest,
            min: config.min_open_interest,
        });
    }
    Ok(())
}

/// Split quotes into admitted ones and rejections, preserving input order.
pub fn clean_quotes(
    quotes: &[OptionQuote],
    config: &EngineConfig,
) -> (Vec<OptionQuote>, Vec<RejectedQuote>) {
    let mut admitted = Vec::with_capacity(quotes.len());
    let mut rejected = Vec::new();
    for quote in quotes {
        match admit(quote, config) {
            Ok(()) => admitted.push(quote.clone()),
            Err(reason) => rejected.push(RejectedQuote {
                quote: quote.clone(),
                reason,
            }),
        }
    }
    (admitted, rejected)
}

/// Group quotes by `(expiry, valuation_date)`, ordered by expiry.
pub fn group_by_expiry(quotes: Vec<OptionQuote>) -> BTreeMap<(NaiveDate, NaiveDate), Vec<OptionQuote>> {
    let mut groups: BTreeMap<(NaiveDate, NaiveDate), Vec<OptionQuote>> = BTreeMap::new();
    for quote in quotes {
        groups
            .entry((quote.expiry, quote.valuation_date))
            .or_default()
            .push(quote);
    }
    groups
}

/// Scalar market inputs shared by every maturity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    pub spot: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
}

impl MarketParams {
    /// Forward `S·exp((r − q)·T)` at `expiry`.
    pub fn forward(&self, expiry: f64) -> f64 {
        forward_price(self.spot, self.rate, self.dividend_yield, expiry)
    }
}

/// Everything the engine needs from the market: spot, carry and quotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub spot: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
    pub quotes: Vec<OptionQuote>,
}

impl MarketSnapshot {
    /// Create a snapshot, validating the scalar market inputs.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] for a non-positive spot or a
    /// non-finite rate or dividend yield.
    pub fn new(
        spot: f64,
        rate: f64,
        dividend_yield: f64,
        quotes: Vec<OptionQuote>,
    ) -> error::Result<Self> {
        let snapshot = Self {
            spot,
            rate,
            dividend_yield,
            quotes,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn params(&self) -> MarketParams {
        MarketParams {
            spot: self.spot,
            rate: self.rate,
            dividend_yield: self.dividend_yield,
        }
    }

    pub(crate) fn validate(&self) -> error::Result<()> {
        validate_positive(self.spot, "spot")?;
        validate_finite(self.rate, "rate")?;
        validate_finite(self.dividend_yield, "dividend_yield")?;
        if self.quotes.is_empty() {
            return Err(VolSurfError::InvalidInput {
                message: "snapshot contains no quotes".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quote(strike: f64, bid: f64, ask: f64) -> OptionQuote {
        OptionQuote {
            strike,
            option_type: OptionType::Call,
            bid,
            ask,
            volume: 10,
            open_interest: 100,
            expiry: date(2026, 6, 19),
            valuation_date: date(2026, 3, 20),
        }
    }

    #[test]
    fn mid_and_intrinsic() {
        let q = quote(100.0, 4.0, 5.0);
        assert_eq!(q.mid(), 4.5);
        assert_eq!(q.intrinsic(103.0), 3.0);
    }

    #[test]
    fn admission_filters_in_order() {
        let config = EngineConfig::default();
        assert!(admit(&quote(100.0, 1.0, 1.2), &config).is_ok());
        assert_eq!(
            admit(&quote(100.0, 0.0, 1.2), &config),
            Err(QuoteRejection::NonPositiveBid(0.0))
        );
        assert_eq!(
            admit(&quote(100.0, 1.0, 0.0), &config),
            Err(QuoteRejection::NonPositiveAsk(0.0))
        );
        assert!(matches!(
            admit(&quote(f64::NAN, 1.0, 1.2), &config),
            Err(QuoteRejection::NonPositiveStrike(_))
        ));

        let mut thin = quote(100.0, 1.0, 1.2);
        thin.volume = 0;
        assert_eq!(
            admit(&thin, &config),
            Err(QuoteRejection::BelowMinVolume { volume: 0, min: 1 })
        );
        thin.volume = 5;
        thin.open_interest = 0;
        assert_eq!(
            admit(&thin, &config),
            Err(QuoteRejection::BelowMinOpenInterest {
                open_interest: 0,
                min: 1
            })
        );
    }

    #[test]
    fn clean_splits_admitted_and_rejected() {
        let quotes = vec![quote(90.0, 1.0, 1.1), quote(95.0, -1.0, 1.1), quote(100.0, 1.0, 1.1)];
        let (admitted, rejected) = clean_quotes(&quotes, &EngineConfig::default());
        assert_eq!(admitted.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].quote.strike, 95.0);
    }

    #[test]
    fn groups_sorted_by_expiry() {
        let mut late = quote(100.0, 1.0, 1.1);
        late.expiry = date(2026, 12, 18);
        let quotes = vec![late, quote(100.0, 1.0, 1.1), quote(105.0, 1.0, 1.1)];
        let groups = group_by_expiry(quotes);
        let keys: Vec<_> = groups.keys().map(|k| k.0).collect();
        assert_eq!(keys, vec![date(2026, 6, 19), date(2026, 12, 18)]);
        assert_eq!(groups.values().next().unwrap().len(), 2);
    }

    #[test]
    fn snapshot_validates_scalars() {
        assert!(MarketSnapshot::new(100.0, 0.03, 0.0, vec![quote(100.0, 1.0, 1.1)]).is_ok());
        assert!(MarketSnapshot::new(0.0, 0.03, 0.0, vec![quote(100.0, 1.0, 1.1)]).is_err());
        assert!(MarketSnapshot::new(100.0, f64::NAN, 0.0, vec![quote(100.0, 1.0, 1.1)]).is_err());
        assert!(MarketSnapshot::new(100.0, 0.03, 0.0, Vec::new()).is_err());
    }
}
