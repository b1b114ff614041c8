//! Non-parametric surface over calendar-corrected smiles.
//!
//! Queries run in two stages:
//!
//! 1. Every log-moneyness node carries a PCHIP of total variance over the
//!    maturities it was observed in, extended linearly past the first and
//!    last maturity. Evaluating all of them at `T` gives a smile slice.
//! 2. A PCHIP across the slice's nodes (also extended linearly) is evaluated
//!    at `k`, and `σ = sqrt(max(w / T, 0))`.
//!
//! With two or more maturities only nodes seen in at least two of them carry
//! a curve. A single maturity scales every node at constant vol,
//! `w(T) = w₀ · T / T₀`.

use std::collections::BTreeMap;

use crate::config::SurfaceGridSpec;
use crate::error::{self, VolSurfError};
use crate::interp::{Extrapolation, Pchip, linspace};
use crate::smile::InterpolatedSmile;
use crate::surface::VolSurface;
use crate::surface::arbitrage::node_key;
use crate::surface::grid::SurfaceGrid;
use crate::surface::hull::ConvexHull;
use crate::types::{Variance, Vol};
use crate::validate::{validate_finite, validate_positive};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Total variance of one log-moneyness node across maturities.
#[derive(Debug, Clone)]
enum NodeCurve {
    /// PCHIP over the observed tenors; flat vol before the first one.
    Term {
        curve: Pchip,
        first_tenor: f64,
        first_variance: f64,
    },
    FlatVol { tenor: f64, variance: f64 },
}

impl NodeCurve {
    fn variance(&self, expiry: f64) -> Option<f64> {
        match self {
            Self::Term {
                first_tenor,
                first_variance,
                ..
            } if expiry < *first_tenor => Some(first_variance * expiry / first_tenor),
            Self::Term { curve, .. } => curve.value(expiry),
            Self::FlatVol { tenor, variance } => Some(variance * expiry / tenor),
        }
    }
}

/// Smile at a fixed maturity, across the surface's nodes.
enum Slice {
    Curve(Pchip),
    Constant(f64),
}

impl Slice {
    fn variance(&self, log_moneyness: f64) -> Option<f64> {
        match self {
            Self::Curve(curve) => curve.value(log_moneyness),
            Self::Constant(w) => Some(*w),
        }
    }
}

/// Query surface built from interpolated smiles.
///
/// Immutable after construction and safe to share across threads.
///
/// # Examples
///
/// ```
/// use volsurf_engine::config::MoneynessGrid;
/// use volsurf_engine::smile::{Smile, SmilePoint, interpolate};
/// use volsurf_engine::surface::{InterpolatedSurface, VolSurface};
///
/// let smile = |t: f64| {
///     let points = [-0.2, -0.1, 0.0, 0.1, 0.2]
///         .iter()
///         .map(|&k: &f64| SmilePoint { log_moneyness: k, vol: 0.2, strike: 100.0 * k.exp() })
///         .collect();
///     interpolate(&Smile::new(t, 100.0, 0.2, points).unwrap(), &MoneynessGrid::default(), 1e-8)
///         .unwrap()
/// };
///
/// let surface = InterpolatedSurface::new(vec![smile(0.25), smile(1.0)], 5.0)?;
/// let vol = surface.black_vol(0.05, 0.5)?;
/// assert!((vol.0 - 0.2).abs() < 1e-10);
/// # Ok::<(), volsurf_engine::VolSurfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct InterpolatedSurface {
    tenors: Vec<f64>,
    nodes: Vec<f64>,
    curves: Vec<NodeCurve>,
    hull: ConvexHull,
    max_vol: f64,
}

impl InterpolatedSurface {
    /// Assemble a surface from calendar-corrected smiles.
    ///
    /// # Errors
    /// - [`VolSurfError::InvalidInput`] for no smiles, repeated maturities,
    ///   or a non-positive `max_vol`.
    /// - [`VolSurfError::InsufficientPoints`] when no node is shared by two
    ///   maturities.
    pub fn new(mut smiles: Vec<InterpolatedSmile>, max_vol: f64) -> error::Result<Self> {
        validate_positive(max_vol, "max_vol")?;
        if smiles.is_empty() {
            return Err(VolSurfError::InvalidInput {
                message: "at least one smile is required".into(),
            });
        }
        smiles.sort_by(|a, b| a.expiry().total_cmp(&b.expiry()));
        if let Some(w) = smiles.windows(2).find(|w| w[0].expiry() == w[1].expiry()) {
            return Err(VolSurfError::InvalidInput {
                message: format!("maturity {} appears more than once", w[0].expiry()),
            });
        }
        let tenors: Vec<f64> = smiles.iter().map(|s| s.expiry()).collect();

        // node key -> (log-moneyness, observations in ascending maturity)
        let mut observed: BTreeMap<i64, (f64, Vec<(f64, f64)>)> = BTreeMap::new();
        let mut pairs = Vec::new();
        for smile in &smiles {
            for (&k, &w) in smile.log_moneyness().iter().zip(smile.total_variance()) {
                observed
                    .entry(node_key(k))
                    .or_insert_with(|| (k, Vec::new()))
                    .1
                    .push((smile.expiry(), w));
                pairs.push((k, smile.expiry()));
            }
        }

        let single = tenors.len() == 1;
        let usable: Vec<(f64, Vec<(f64, f64)>)> = observed
            .into_values()
            .filter(|(_, obs)| single || obs.len() >= 2)
            .collect();
        if usable.is_empty() {
            return Err(VolSurfError::InsufficientPoints {
                expiry: tenors[0],
                points: 0,
                required: 2,
            });
        }

        let build = |(k, obs): &(f64, Vec<(f64, f64)>)| -> error::Result<(f64, NodeCurve)> {
            let curve = if obs.len() == 1 {
                NodeCurve::FlatVol {
                    tenor: obs[0].0,
                    variance: obs[0].1,
                }
            } else {
                let (ts, ws): (Vec<f64>, Vec<f64>) = obs.iter().copied().unzip();
                NodeCurve::Term {
                    first_tenor: ts[0],
                    first_variance: ws[0],
                    curve: Pchip::new(ts, ws, Extrapolation::Linear)?,
                }
            };
            Ok((*k, curve))
        };

        #[cfg(feature = "parallel")]
        let built: Vec<(f64, NodeCurve)> =
            usable.par_iter().map(build).collect::<error::Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let built: Vec<(f64, NodeCurve)> =
            usable.iter().map(build).collect::<error::Result<Vec<_>>>()?;

        let (nodes, curves): (Vec<f64>, Vec<NodeCurve>) = built.into_iter().unzip();

        #[cfg(feature = "logging")]
        tracing::debug!(
            tenors = tenors.len(),
            nodes = nodes.len(),
            "interpolated surface assembled"
        );

        Ok(Self {
            tenors,
            nodes,
            curves,
            hull: ConvexHull::new(&pairs),
            max_vol,
        })
    }

    /// Log-moneyness nodes that carry a term-structure curve.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Convex hull of every observed `(log_moneyness, tenor)` pair.
    pub fn hull(&self) -> &ConvexHull {
        &self.hull
    }

    fn slice(&self, expiry: f64) -> error::Result<Slice> {
        let ws = self
            .curves
            .iter()
            .map(|c| c.variance(expiry))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| VolSurfError::NumericalError {
                message: format!("node curve refused maturity {expiry}"),
            })?;
        if ws.len() == 1 {
            return Ok(Slice::Constant(ws[0]));
        }
        Ok(Slice::Curve(Pchip::new(
            self.nodes.clone(),
            ws,
            Extrapolation::Linear,
        )?))
    }

    fn slice_variance(slice: &Slice, log_moneyness: f64) -> error::Result<f64> {
        slice
            .variance(log_moneyness)
            .ok_or_else(|| VolSurfError::NumericalError {
                message: format!("slice refused log-moneyness {log_moneyness}"),
            })
    }

    /// Sample the surface on the rectangle spanned by the nodes and tenors.
    ///
    /// Cells outside [`hull`](Self::hull) are absent and present values are
    /// clipped to `[0, max_vol]`. A configured smoothing width is applied last.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] for fewer than two points on
    /// either axis or a non-positive smoothing width.
    pub fn grid(&self, spec: &SurfaceGridSpec) -> error::Result<SurfaceGrid> {
        if spec.moneyness_points < 2 || spec.tenor_points < 2 {
            return Err(VolSurfError::InvalidInput {
                message: format!(
                    "surface grid needs at least 2x2 points, got {}x{}",
                    spec.moneyness_points, spec.tenor_points
                ),
            });
        }
        let axis = |lower: f64, upper: f64, n: usize| {
            if upper > lower {
                linspace(lower, upper, n)
            } else {
                vec![lower]
            }
        };
        let ks = axis(self.nodes[0], self.nodes[self.nodes.len() - 1], spec.moneyness_points);
        let ts = axis(self.tenors[0], self.tenors[self.tenors.len() - 1], spec.tenor_points);

        let row = |&t: &f64| -> error::Result<Vec<Option<f64>>> {
            let slice = self.slice(t)?;
            ks.iter()
                .map(|&k| {
                    if !self.hull.contains((k, t)) {
                        return Ok(None);
                    }
                    let w = Self::slice_variance(&slice, k)?;
                    Ok(Some((w / t).max(0.0).sqrt().min(self.max_vol)))
                })
                .collect()
        };

        #[cfg(feature = "parallel")]
        let vols = ts.par_iter().map(row).collect::<error::Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let vols = ts.iter().map(row).collect::<error::Result<Vec<_>>>()?;

        let grid = SurfaceGrid::new(ks, ts, vols);
        match spec.smoothing_sigma {
            Some(sigma) => grid.smoothed(sigma),
            None => Ok(grid),
        }
    }
}

impl VolSurface for InterpolatedSurface {
    fn black_vol(&self, log_moneyness: f64, expiry: f64) -> error::Result<Vol> {
        let w = self.black_variance(log_moneyness, expiry)?;
        if expiry <= 0.0 {
            return Ok(Vol(0.0));
        }
        Ok(Vol((w.0 / expiry).sqrt()))
    }

    fn black_variance(&self, log_moneyness: f64, expiry: f64) -> error::Result<Variance> {
        validate_finite(log_moneyness, "log_moneyness")?;
        validate_finite(expiry, "expiry")?;
        if expiry <= 0.0 {
            return Ok(Variance(0.0));
        }
        let slice = self.slice(expiry)?;
        let w = Self::slice_variance(&slice, log_moneyness)?;
        Ok(Variance(w.max(0.0)))
    }

    fn tenors(&self) -> &[f64] {
        &self.tenors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MoneynessGrid;
    use crate::smile::{Smile, SmilePoint, interpolate};
    use approx::assert_abs_diff_eq;

    fn smile(t: f64, points: &[(f64, f64)]) -> InterpolatedSmile {
        let points = points
            .iter()
            .map(|&(k, vol)| SmilePoint {
                log_moneyness: k,
                vol,
                strike: 100.0 * f64::exp(k),
            })
            .collect();
        interpolate(
            &Smile::new(t, 100.0, 0.2, points).unwrap(),
            &MoneynessGrid::default(),
            1e-8,
        )
        .unwrap()
    }

    fn flat(t: f64, vol: f64) -> InterpolatedSmile {
        smile(t, &[(-0.2, vol), (0.0, vol), (0.2, vol)])
    }

    #[test]
    fn flat_surface_between_and_beyond_maturities() {
        let surface = InterpolatedSurface::new(vec![flat(0.1, 0.2), flat(0.5, 0.2)], 5.0).unwrap();
        for t in [0.05, 0.1, 0.3, 0.5, 2.0] {
            for k in [-0.3, -0.2, 0.0, 0.15, 0.4] {
                assert_abs_diff_eq!(surface.black_vol(k, t).unwrap().0, 0.2, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn short_end_keeps_first_maturity_vol() {
        // Rising term structure: a linear tangent would go negative before 0.1.
        let surface = InterpolatedSurface::new(vec![flat(0.1, 0.1), flat(0.5, 0.3)], 5.0).unwrap();
        for t in [0.02, 0.05, 0.08, 0.1] {
            for k in [-0.2, 0.0, 0.2] {
                assert_abs_diff_eq!(surface.black_vol(k, t).unwrap().0, 0.1, epsilon = 1e-12);
            }
        }
        let w = surface.black_variance(0.0, 0.05).unwrap().0;
        assert_abs_diff_eq!(w, 0.1 * 0.1 * 0.05, epsilon = 1e-15);
    }

    #[test]
    fn reproduces_smiles_at_their_maturities() {
        let short = smile(0.25, &[(-0.2, 0.3), (-0.1, 0.24), (0.0, 0.2), (0.1, 0.22), (0.2, 0.26)]);
        let long = smile(1.0, &[(-0.2, 0.3), (-0.1, 0.25), (0.0, 0.22), (0.1, 0.23), (0.2, 0.27)]);
        let surface = InterpolatedSurface::new(vec![long, short.clone()], 5.0).unwrap();
        for k in [-0.2, -0.1, 0.0, 0.1, 0.2] {
            let expected = short.vol(k).unwrap().0;
            assert_abs_diff_eq!(surface.black_vol(k, 0.25).unwrap().0, expected, epsilon = 1e-12);
        }
        assert_eq!(surface.tenors(), &[0.25, 1.0]);
    }

    #[test]
    fn variance_is_monotone_in_maturity() {
        let surface = InterpolatedSurface::new(
            vec![flat(0.25, 0.25), flat(0.5, 0.22), flat(1.0, 0.2)],
            5.0,
        )
        .unwrap();
        let mut prev = 0.0;
        for i in 1..=40 {
            let t = 0.025 * i as f64;
            let w = surface.black_variance(0.0, t).unwrap().0;
            assert!(w >= prev - 1e-15, "variance decreased at T={t}");
            prev = w;
        }
    }

    #[test]
    fn zero_maturity_is_zero_vol() {
        let surface = InterpolatedSurface::new(vec![flat(0.1, 0.2), flat(0.5, 0.2)], 5.0).unwrap();
        assert_eq!(surface.black_vol(0.0, 0.0).unwrap().0, 0.0);
        assert_eq!(surface.black_vol(0.1, -1.0).unwrap().0, 0.0);
        assert!(surface.black_vol(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn single_maturity_scales_at_flat_vol() {
        let surface = InterpolatedSurface::new(vec![flat(0.5, 0.2)], 5.0).unwrap();
        assert_abs_diff_eq!(surface.black_vol(0.0, 2.0).unwrap().0, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.black_variance(0.1, 1.0).unwrap().0, 0.04, epsilon = 1e-12);
    }

    #[test]
    fn unshared_nodes_are_excluded() {
        let short = smile(0.25, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let long = smile(1.0, &[(-0.4, 0.2), (0.0, 0.2), (0.4, 0.2)]);
        let surface = InterpolatedSurface::new(vec![short, long], 5.0).unwrap();
        let nodes = surface.nodes();
        assert!(nodes[0] >= -0.1 - 1e-12);
        assert!(nodes[nodes.len() - 1] <= 0.1 + 1e-12);
    }

    #[test]
    fn rejects_duplicate_and_empty_input() {
        assert!(InterpolatedSurface::new(Vec::new(), 5.0).is_err());
        assert!(InterpolatedSurface::new(vec![flat(0.5, 0.2), flat(0.5, 0.3)], 5.0).is_err());
        assert!(InterpolatedSurface::new(vec![flat(0.5, 0.2)], 0.0).is_err());
    }

    #[test]
    fn grid_masks_outside_hull_and_clips() {
        let short = smile(0.25, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let long = smile(1.0, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let surface = InterpolatedSurface::new(vec![short, long], 0.15).unwrap();
        let spec = SurfaceGridSpec {
            moneyness_points: 5,
            tenor_points: 4,
            smoothing_sigma: None,
        };
        let grid = surface.grid(&spec).unwrap();
        assert_eq!(grid.tenors().len(), 4);
        assert_eq!(grid.log_moneyness().len(), 5);
        assert_eq!(grid.points().len(), 20);
        assert!(grid.points().iter().all(|p| p.vol == 0.15));
        assert!(!grid.is_smoothed());
    }

    #[test]
    fn grid_inside_trapezoid_hull_is_complete() {
        let short = smile(0.25, &[(-0.1, 0.2), (0.0, 0.2), (0.1, 0.2)]);
        let long = smile(1.0, &[(-0.4, 0.2), (-0.1, 0.2), (0.0, 0.2), (0.1, 0.2), (0.4, 0.2)]);
        let surface = InterpolatedSurface::new(vec![short, long], 5.0).unwrap();
        let spec = SurfaceGridSpec {
            moneyness_points: 5,
            tenor_points: 5,
            smoothing_sigma: Some(1.0),
        };
        let grid = surface.grid(&spec).unwrap();
        assert!(grid.is_smoothed());
        // Nodes span [-0.1, 0.1]; every column is inside the hull at every row.
        assert_eq!(grid.points().len(), 25);
        for p in grid.points() {
            assert_abs_diff_eq!(p.vol, 0.2, epsilon = 1e-10);
        }
    }
}
