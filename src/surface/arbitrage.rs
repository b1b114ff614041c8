//! Calendar arbitrage repair.
//!
//! Total variance must be non-decreasing in maturity at every log-moneyness.
//! Each node is walked across ascending maturities and its variance replaced
//! by the running maximum seen so far. Earlier maturities are never touched,
//! and applying the correction twice changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error;
use crate::smile::InterpolatedSmile;
use crate::smile::interpolated::NODE_TOLERANCE;

/// A node whose total variance fell below an earlier maturity's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarViolation {
    pub log_moneyness: f64,
    /// Maturity holding the running maximum.
    pub tenor_short: f64,
    /// Maturity that was corrected.
    pub tenor_long: f64,
    /// Running maximum, now also the corrected value at `tenor_long`.
    pub variance_short: f64,
    /// Variance at `tenor_long` before correction.
    pub variance_long: f64,
}

/// Key shared by nodes that coincide within [`NODE_TOLERANCE`].
pub(crate) fn node_key(log_moneyness: f64) -> i64 {
    (log_moneyness / NODE_TOLERANCE).round() as i64
}

/// Enforce calendar monotonicity across `smiles`.
///
/// Returns the corrected smiles in ascending maturity order together with one
/// violation per corrected `(node, maturity)`.
///
/// # Errors
/// Propagates [`VolSurfError::InvalidInput`](crate::VolSurfError::InvalidInput)
/// from rebuilding a corrected smile.
///
/// # Examples
///
/// ```
/// use volsurf_engine::config::MoneynessGrid;
/// use volsurf_engine::smile::{Smile, SmilePoint, interpolate};
/// use volsurf_engine::surface::enforce_calendar;
///
/// let smile = |t: f64, vol: f64| {
///     let points = [-0.1, 0.0, 0.1]
///         .iter()
///         .map(|&k: &f64| SmilePoint { log_moneyness: k, vol, strike: 100.0 * k.exp() })
///         .collect();
///     let s = Smile::new(t, 100.0, vol, points).unwrap();
///     interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap()
/// };
///
/// // 0.5y at 20% has less total variance than 0.25y at 30%.
/// let (fixed, violations) = enforce_calendar(vec![smile(0.25, 0.3), smile(0.5, 0.2)])?;
/// assert!(!violations.is_empty());
/// assert_eq!(fixed[1].total_variance(), fixed[0].total_variance());
/// # Ok::<(), volsurf_engine::VolSurfError>(())
/// ```
pub fn enforce_calendar(
    mut smiles: Vec<InterpolatedSmile>,
) -> error::Result<(Vec<InterpolatedSmile>, Vec<CalendarViolation>)> {
    smiles.sort_by(|a, b| a.expiry().total_cmp(&b.expiry()));

    // node key -> (running max, maturity it came from)
    let mut running: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
    let mut violations = Vec::new();
    let mut corrected = Vec::with_capacity(smiles.len());

    for smile in smiles {
        let tenor = smile.expiry();
        let mut variances = smile.total_variance().to_vec();
        let mut changed = false;

        for (&k, w) in smile.log_moneyness().iter().zip(variances.iter_mut()) {
            let entry = running.entry(node_key(k)).or_insert((*w, tenor));
            if *w < entry.0 {
                violations.push(CalendarViolation {
                    log_moneyness: k,
                    tenor_short: entry.1,
                    tenor_long: tenor,
                    variance_short: entry.0,
                    variance_long: *w,
                });
                *w = entry.0;
                changed = true;
            } else {
                *entry = (*w, tenor);
            }
        }

        corrected.push(if changed {
            smile.with_total_variance(variances)?
        } else {
            smile
        });
    }

    #[cfg(feature = "logging")]
    if !violations.is_empty() {
        tracing::debug!(
            corrections = violations.len(),
            "calendar arbitrage corrected"
        );
    }

    Ok((corrected, violations))
}
