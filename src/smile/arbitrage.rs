//! Butterfly arbitrage diagnostics for smiles.
//!
//! A smile whose implied vol is locally concave in log-moneyness is at risk of
//! butterfly arbitrage. The check flags every negative second difference; it
//! never modifies the smile.

use serde::{Deserialize, Serialize};

/// Report on the butterfly-arbitrage risk of a smile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageReport {
    /// Whether no violation was detected.
    pub is_free: bool,
    pub butterfly_violations: Vec<ButterflyViolation>,
}

impl ArbitrageReport {
    /// Return the worst (largest magnitude) butterfly violation, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use volsurf_engine::smile::check_butterfly;
    ///
    /// let report = check_butterfly(&[-0.2, -0.1, 0.0, 0.1, 0.2], &[0.3, 0.2, 0.25, 0.24, 0.26]);
    /// assert!(!report.is_free);
    /// let worst = report.worst_violation().unwrap();
    /// assert!((worst.log_moneyness - 0.0).abs() < 1e-12);
    /// ```
    pub fn worst_violation(&self) -> Option<&ButterflyViolation> {
        self.butterfly_violations
            .iter()
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
    }
}

/// A local concavity in the smile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButterflyViolation {
    /// Log-moneyness of the middle point of the offending triple.
    pub log_moneyness: f64,
    /// Second difference `v[i+1] − 2·v[i] + v[i−1]` (negative).
    pub second_difference: f64,
    pub magnitude: f64,
}

/// Flag negative second differences of `vols` over sorted `log_moneyness`.
///
/// Fewer than three points cannot be checked and report as free.
pub fn check_butterfly(log_moneyness: &[f64], vols: &[f64]) -> ArbitrageReport {
    let n = log_moneyness.len().min(vols.len());
    let butterfly_violations: Vec<ButterflyViolation> = vols[..n]
        .windows(3)
        .enumerate()
        .filter_map(|(i, w)| {
            let second_difference = w[2] - 2.0 * w[1] + w[0];
            (second_difference < 0.0).then(|| ButterflyViolation {
                log_moneyness: log_moneyness[i + 1],
                second_difference,
                magnitude: second_difference.abs(),
            })
        })
        .collect();

    ArbitrageReport {
        is_free: butterfly_violations.is_empty(),
        butterfly_violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_tail_is_ignored() {
        let ks = [-0.1, 0.0, 0.1];
        let vols = [0.25, 0.2, 0.25, 0.1, 0.4];
        assert!(check_butterfly(&ks, &vols).is_free);
        let report = check_butterfly(&ks[..2], &[0.25, 0.3, 0.2, 0.1]);
        assert!(report.is_free);
    }

    #[test]
    fn convex_smile_is_free() {
        let ks = [-0.2, -0.1, 0.0, 0.1, 0.2];
        let vols = [0.30, 0.24, 0.20, 0.22, 0.27];
        let report = check_butterfly(&ks, &vols);
        assert!(report.is_free);
        assert!(report.worst_violation().is_none());
    }

    #[test]
    fn concave_kink_is_flagged_at_middle_point() {
        let ks = [-0.1, 0.0, 0.1];
        let vols = [0.20, 0.25, 0.20];
        let report = check_butterfly(&ks, &vols);
        assert!(!report.is_free);
        assert_eq!(report.butterfly_violations.len(), 1);
        let v = &report.butterfly_violations[0];
        assert_eq!(v.log_moneyness, 0.0);
        assert!((v.second_difference + 0.10).abs() < 1e-12);
    }

    #[test]
    fn too_few_points_is_free() {
        assert!(check_butterfly(&[0.0, 0.1], &[0.2, 0.1]).is_free);
        assert!(check_butterfly(&[], &[]).is_free);
    }

    #[test]
    fn worst_violation_picks_largest() {
        let ks = [-0.2, -0.1, 0.0, 0.1, 0.2];
        let vols = [0.20, 0.21, 0.20, 0.26, 0.20];
        let report = check_butterfly(&ks, &vols);
        assert!(report.butterfly_violations.len() >= 2);
        assert_eq!(report.worst_violation().unwrap().log_moneyness, 0.1);
    }
}
