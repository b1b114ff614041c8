//! Gridded total-variance representation of a smile.
//!
//! # Algorithm
//!
//! 1. Convert to total variance `w = σ²·T`, average duplicate nodes.
//! 2. Take the node nearest `k = 0` as the ATM anchor.
//! 3. Project outward: moving away from the anchor on either side, each
//!    variance becomes the running maximum seen so far, so `w` never
//!    decreases away from the money.
//! 4. Fit a PCHIP through the projected nodes and sample it on the target grid
//!    clipped to the observed domain, with the nodes themselves unioned in.
//! 5. Floor the variance before converting back to vol.
//!
//! The result refuses queries outside the observed domain.

use crate::config::{EngineConfig, MoneynessGrid};
use crate::error::{self, VolSurfError};
use crate::interp::{Extrapolation, Pchip, collapse_duplicates, linspace};
use crate::smile::Smile;
use crate::types::{Variance, Vol};
use crate::validate::{validate_finite, validate_positive};

/// Nodes closer than this are treated as the same log-moneyness.
pub(crate) const NODE_TOLERANCE: f64 = 1e-10;

/// Total variance on a log-moneyness grid for one maturity.
#[derive(Debug, Clone)]
pub struct InterpolatedSmile {
    expiry: f64,
    forward: f64,
    log_moneyness: Vec<f64>,
    total_variance: Vec<f64>,
    atm_index: usize,
    grid_points: usize,
    curve: Pchip,
}

impl InterpolatedSmile {
    fn from_grid(
        expiry: f64,
        forward: f64,
        log_moneyness: Vec<f64>,
        total_variance: Vec<f64>,
        atm_index: usize,
        grid_points: usize,
    ) -> error::Result<Self> {
        let curve = Pchip::new(
            log_moneyness.clone(),
            total_variance.clone(),
            Extrapolation::Refuse,
        )?;
        Ok(Self {
            expiry,
            forward,
            log_moneyness,
            total_variance,
            atm_index,
            grid_points,
            curve,
        })
    }

    /// A copy carrying corrected total variances on the same grid.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] on a length mismatch or
    /// non-finite values.
    pub fn with_total_variance(&self, total_variance: Vec<f64>) -> error::Result<Self> {
        if total_variance.len() != self.log_moneyness.len() {
            return Err(VolSurfError::InvalidInput {
                message: format!(
                    "expected {} variances, got {}",
                    self.log_moneyness.len(),
                    total_variance.len()
                ),
            });
        }
        Self::from_grid(
            self.expiry,
            self.forward,
            self.log_moneyness.clone(),
            total_variance,
            self.atm_index,
            self.grid_points,
        )
    }

    /// Time to expiry in years.
    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    pub fn forward(&self) -> f64 {
        self.forward
    }

    pub fn log_moneyness(&self) -> &[f64] {
        &self.log_moneyness
    }

    pub fn total_variance(&self) -> &[f64] {
        &self.total_variance
    }

    /// Implied vols `sqrt(w / T)` on the grid.
    pub fn vols(&self) -> Vec<f64> {
        self.total_variance
            .iter()
            .map(|w| (w / self.expiry).sqrt())
            .collect()
    }

    /// Index of the ATM anchor node on the grid.
    pub fn atm_index(&self) -> usize {
        self.atm_index
    }

    /// Number of target grid points inside the observed domain.
    pub fn grid_points(&self) -> usize {
        self.grid_points
    }

    /// Observed log-moneyness domain `(lower, upper)`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.log_moneyness[0],
            self.log_moneyness[self.log_moneyness.len() - 1],
        )
    }

    /// Total variance at `log_moneyness`.
    ///
    /// # Errors
    /// [`VolSurfError::ExtrapolationRefused`] outside [`domain`](Self::domain).
    pub fn variance(&self, log_moneyness: f64) -> error::Result<Variance> {
        validate_finite(log_moneyness, "log_moneyness")?;
        let (lower, upper) = self.domain();
        self.curve
            .value(log_moneyness)
            .map(Variance)
            .ok_or(VolSurfError::ExtrapolationRefused {
                log_moneyness,
                lower,
                upper,
            })
    }

    /// Implied vol at `log_moneyness`.
    ///
    /// # Errors
    /// [`VolSurfError::ExtrapolationRefused`] outside [`domain`](Self::domain).
    pub fn vol(&self, log_moneyness: f64) -> error::Result<Vol> {
        let w = self.variance(log_moneyness)?;
        Ok(Vol((w.0.max(0.0) / self.expiry).sqrt()))
    }

    /// Post-interpolation admission: maturity and grid density.
    ///
    /// # Errors
    /// [`VolSurfError::BelowMinMaturity`] or [`VolSurfError::InsufficientPoints`].
    pub fn check_admissible(&self, config: &EngineConfig) -> error::Result<()> {
        if self.expiry < config.min_maturity {
            return Err(VolSurfError::BelowMinMaturity {
                expiry: self.expiry,
                min_maturity: config.min_maturity,
            });
        }
        if self.grid_points < config.min_points_per_maturity {
            return Err(VolSurfError::InsufficientPoints {
                expiry: self.expiry,
                points: self.grid_points,
                required: config.min_points_per_maturity,
            });
        }
        Ok(())
    }
}

/// Interpolate a smile's total variance onto `grid`.
///
/// # Errors
/// - [`VolSurfError::InsufficientPoints`] when the smile has fewer than two
///   distinct nodes.
/// - [`VolSurfError::InvalidInput`] for a non-positive floor.
pub fn interpolate(
    smile: &Smile,
    grid: &MoneynessGrid,
    variance_floor: f64,
) -> error::Result<InterpolatedSmile> {
    validate_positive(variance_floor, "variance_floor")?;
    let expiry = smile.expiry();

    let (nodes, mut variances) = collapse_duplicates(
        smile
            .points()
            .iter()
            .map(|p| (p.log_moneyness, p.vol * p.vol * expiry))
            .collect(),
    );
    if nodes.len() < 2 {
        return Err(VolSurfError::InsufficientPoints {
            expiry,
            points: nodes.len(),
            required: 2,
        });
    }

    // The nearest node is the anchor; it already carries its own variance.
    let atm_node = nearest_to_zero(&nodes);
    project_outward(&mut variances, atm_node);

    let curve = Pchip::new(nodes.clone(), variances.clone(), Extrapolation::Refuse)?;
    let (lower, upper) = (nodes[0], nodes[nodes.len() - 1]);
    let targets: Vec<f64> = linspace(grid.lower, grid.upper, grid.points)
        .into_iter()
        .filter(|&k| k >= lower && k <= upper)
        .collect();
    let grid_points = targets.len();

    let log_moneyness = merge_nodes(&nodes, &targets);
    let mut total_variance = log_moneyness
        .iter()
        .map(|&k| {
            curve
                .value(k)
                .map(|w| clamp_to_bracket(&nodes, &variances, k, w).max(variance_floor))
                .ok_or(VolSurfError::NumericalError {
                    message: format!("grid point {k} fell outside [{lower}, {upper}]"),
                })
        })
        .collect::<error::Result<Vec<f64>>>()?;

    let atm_k = nodes[atm_node];
    let atm_index = log_moneyness
        .iter()
        .position(|&k| k == atm_k)
        .unwrap_or_else(|| nearest_to_zero(&log_moneyness));
    // Bracketed values never exceed the outer node, so this leaves nodes exact.
    project_outward(&mut total_variance, atm_index);

    #[cfg(feature = "logging")]
    tracing::debug!(
        expiry,
        nodes = nodes.len(),
        grid_points,
        atm_k,
        "smile interpolated"
    );

    InterpolatedSmile::from_grid(
        expiry,
        smile.forward(),
        log_moneyness,
        total_variance,
        atm_index,
        grid_points,
    )
}

/// Running maximum outward from `anchor` on both sides, in place.
///
/// # Examples
///
/// ```
/// use volsurf_engine::smile::interpolated::project_outward;
///
/// let mut w = vec![0.05, 0.06, 0.04, 0.03, 0.035, 0.02];
/// project_outward(&mut w, 3);
/// assert_eq!(w, vec![0.06, 0.06, 0.04, 0.03, 0.035, 0.035]);
/// ```
pub fn project_outward(values: &mut [f64], anchor: usize) {
    for i in (0..anchor).rev() {
        values[i] = values[i].max(values[i + 1]);
    }
    for i in anchor + 1..values.len() {
        values[i] = values[i].max(values[i - 1]);
    }
}

/// Node value at a node; otherwise `value` clamped into the range of the
/// two nodes around `k`.
fn clamp_to_bracket(nodes: &[f64], variances: &[f64], k: f64, value: f64) -> f64 {
    let j = nodes.partition_point(|&x| x < k);
    if nodes.get(j) == Some(&k) {
        return variances[j];
    }
    if j == 0 || j >= nodes.len() {
        return value;
    }
    let (a, b) = (variances[j - 1], variances[j]);
    value.clamp(a.min(b), a.max(b))
}

fn nearest_to_zero(xs: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in xs.iter().enumerate() {
        if x.abs() < xs[best].abs() {
            best = i;
        }
    }
    best
}

/// Sorted union of `nodes` and `targets`; a target within
/// [`NODE_TOLERANCE`] of a node is replaced by the node.
fn merge_nodes(nodes: &[f64], targets: &[f64]) -> Vec<f64> {
    let mut all: Vec<(f64, bool)> = nodes
        .iter()
        .map(|&k| (k, true))
        .chain(targets.iter().map(|&k| (k, false)))
        .collect();
    all.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, bool)> = Vec::with_capacity(all.len());
    for (k, is_node) in all {
        match merged.last_mut() {
            Some(last) if (k - last.0).abs() < NODE_TOLERANCE => {
                if is_node && !last.1 {
                    *last = (k, true);
                }
            }
            _ => merged.push((k, is_node)),
        }
    }
    merged.into_iter().map(|(k, _)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smile::SmilePoint;
    use approx::assert_abs_diff_eq;

    fn smile(expiry: f64, points: &[(f64, f64)]) -> Smile {
        let points = points
            .iter()
            .map(|&(k, vol)| SmilePoint {
                log_moneyness: k,
                vol,
                strike: 100.0 * k.exp(),
            })
            .collect();
        Smile::new(expiry, 100.0, 0.2, points).unwrap()
    }

    fn outward_monotone(s: &InterpolatedSmile) -> bool {
        let w = s.total_variance();
        let a = s.atm_index();
        (0..a).all(|i| w[i] >= w[i + 1]) && (a + 1..w.len()).all(|i| w[i] >= w[i - 1])
    }

    #[test]
    fn flat_smile_reproduces_vol() {
        let s = smile(0.5, &[(-0.3, 0.2), (-0.1, 0.2), (0.0, 0.2), (0.1, 0.2), (0.3, 0.2)]);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        for v in interp.vols() {
            assert_abs_diff_eq!(v, 0.2, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(interp.vol(0.05).unwrap().0, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn grid_is_clipped_to_domain_and_keeps_nodes() {
        let s = smile(1.0, &[(-0.123, 0.25), (0.0, 0.2), (0.217, 0.24)]);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        let ks = interp.log_moneyness();
        assert_eq!(ks[0], -0.123);
        assert_eq!(ks[ks.len() - 1], 0.217);
        assert!(ks.contains(&0.0));
        // Grid step 0.01: -0.12 ..= 0.21 → 34 points.
        assert_eq!(interp.grid_points(), 34);
        assert!(ks.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn passes_through_original_nodes() {
        let pts = [(-0.2, 0.28), (-0.05, 0.22), (0.0, 0.2), (0.07, 0.21), (0.2, 0.25)];
        let s = smile(0.25, &pts);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        for &(k, vol) in &pts {
            let i = interp.log_moneyness().iter().position(|&x| x == k).unwrap();
            assert_abs_diff_eq!(interp.total_variance()[i], vol * vol * 0.25, epsilon = 1e-15);
        }
    }

    #[test]
    fn flat_wings_keep_node_values_exactly() {
        let s = smile(0.5, &[(-0.3, 0.1), (0.0, 0.1), (0.3, 0.1)]);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        let w = 0.1 * 0.1 * 0.5;
        for k in [-0.3, 0.0, 0.3] {
            assert_eq!(interp.variance(k).unwrap().0, w);
        }
        assert!(interp.total_variance().iter().all(|&v| v == w));
    }

    #[test]
    fn projection_removes_inward_dips() {
        // Wing noise: variance dips moving away from the money.
        let s = smile(
            0.5,
            &[(-0.3, 0.22), (-0.2, 0.26), (-0.1, 0.21), (0.01, 0.2), (0.1, 0.23), (0.2, 0.21)],
        );
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        assert_eq!(interp.log_moneyness()[interp.atm_index()], 0.01);
        assert!(outward_monotone(&interp));
        let far_left = interp.variance(-0.3).unwrap().0;
        assert_abs_diff_eq!(far_left, 0.26 * 0.26 * 0.5, epsilon = 1e-15);
    }

    #[test]
    fn refuses_extrapolation() {
        let s = smile(0.5, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        assert!(matches!(
            interp.vol(0.2),
            Err(VolSurfError::ExtrapolationRefused { .. })
        ));
        assert!(matches!(
            interp.variance(-0.11),
            Err(VolSurfError::ExtrapolationRefused { .. })
        ));
    }

    #[test]
    fn variance_is_floored() {
        let s = smile(0.5, &[(-0.1, 1e-6), (0.0, 1e-6), (0.1, 1e-6)]);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        assert!(interp.total_variance().iter().all(|&w| w == 1e-8));
    }

    #[test]
    fn single_node_is_insufficient() {
        let s = smile(0.5, &[(0.0, 0.2)]);
        assert!(matches!(
            interpolate(&s, &MoneynessGrid::default(), 1e-8),
            Err(VolSurfError::InsufficientPoints { points: 1, .. })
        ));
    }

    #[test]
    fn admissibility_filters() {
        let config = EngineConfig::default();
        let short = smile(0.01, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let interp = interpolate(&short, &config.moneyness_grid, 1e-8).unwrap();
        assert!(matches!(
            interp.check_admissible(&config),
            Err(VolSurfError::BelowMinMaturity { .. })
        ));

        let sparse = smile(0.5, &[(-0.015, 0.2), (0.0, 0.2), (0.015, 0.2)]);
        let interp = interpolate(&sparse, &config.moneyness_grid, 1e-8).unwrap();
        assert_eq!(interp.grid_points(), 3);
        assert!(matches!(
            interp.check_admissible(&config),
            Err(VolSurfError::InsufficientPoints { points: 3, required: 5, .. })
        ));

        let wide = smile(0.5, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let interp = interpolate(&wide, &config.moneyness_grid, 1e-8).unwrap();
        assert!(interp.check_admissible(&config).is_ok());
    }

    #[test]
    fn corrected_copy_keeps_grid() {
        let s = smile(0.5, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let interp = interpolate(&s, &MoneynessGrid::default(), 1e-8).unwrap();
        let bumped: Vec<f64> = interp.total_variance().iter().map(|w| w * 2.0).collect();
        let copy = interp.with_total_variance(bumped).unwrap();
        assert_eq!(copy.log_moneyness(), interp.log_moneyness());
        assert_abs_diff_eq!(copy.variance(0.0).unwrap().0, 0.04, epsilon = 1e-15);
        assert!(interp.with_total_variance(vec![0.1]).is_err());
    }
}
