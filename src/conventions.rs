//! Market conventions: moneyness, forwards and year fractions.

use chrono::NaiveDate;

/// Convert a strike to log-moneyness: k = ln(K / F).
pub fn log_moneyness(strike: f64, forward: f64) -> f64 {
    (strike / forward).ln()
}

/// Convert log-moneyness back to a strike: K = F · exp(k).
pub fn strike_from_log_moneyness(log_moneyness: f64, forward: f64) -> f64 {
    forward * log_moneyness.exp()
}

/// Compute forward price from spot: F = S · exp((r − q) · T).
pub fn forward_price(spot: f64, rate: f64, dividend_yield: f64, expiry: f64) -> f64 {
    spot * ((rate - dividend_yield) * expiry).exp()
}

/// Actual/basis year fraction between valuation and expiry dates.
///
/// Negative when the expiry precedes the valuation date.
pub fn year_fraction(valuation_date: NaiveDate, expiry: NaiveDate, basis: f64) -> f64 {
    (expiry - valuation_date).num_days() as f64 / basis
}
