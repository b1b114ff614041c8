//! One-dimensional interpolation primitives.
//!
//! - [`Pchip`] — Fritsch-Carlson monotone cubic Hermite interpolation
//!   (no overshoot, preserves local monotonicity of the data).
//! - [`Linear`] — piecewise linear with linear extension past both ends.
//!
//! # References
//! - Fritsch, F.N. & Carlson, R.E. "Monotone Piecewise Cubic Interpolation" (1980)

use crate::error::{self, VolSurfError};

/// Behaviour of [`Pchip`] outside its node range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extrapolation {
    /// Queries outside the node range return `None`.
    Refuse,
    /// Extend along the end tangent.
    Linear,
}

/// Shape-preserving piecewise cubic Hermite interpolant.
#[derive(Debug, Clone)]
pub(crate) struct Pchip {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
    extrapolation: Extrapolation,
}

impl Pchip {
    /// Build an interpolant through `(x, y)`.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] for fewer than 2 nodes, length
    /// mismatch, non-finite values or abscissas that are not strictly increasing.
    pub(crate) fn new(x: Vec<f64>, y: Vec<f64>, extrapolation: Extrapolation) -> error::Result<Self> {
        validate_nodes(&x, &y, 2)?;
        let slopes = pchip_slopes(&x, &y);
        Ok(Self {
            x,
            y,
            slopes,
            extrapolation,
        })
    }

    /// Interpolated value at `xq`, or `None` when extrapolation is refused.
    pub(crate) fn value(&self, xq: f64) -> Option<f64> {
        let n = self.x.len();
        if xq < self.x[0] || xq > self.x[n - 1] {
            return match self.extrapolation {
                Extrapolation::Refuse => None,
                Extrapolation::Linear if xq < self.x[0] => {
                    Some(self.y[0] + self.slopes[0] * (xq - self.x[0]))
                }
                Extrapolation::Linear => {
                    Some(self.y[n - 1] + self.slopes[n - 1] * (xq - self.x[n - 1]))
                }
            };
        }

        let i = interval_index(&self.x, xq);
        let h = self.x[i + 1] - self.x[i];
        let t = (xq - self.x[i]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        Some(
            h00 * self.y[i]
                + h10 * h * self.slopes[i]
                + h01 * self.y[i + 1]
                + h11 * h * self.slopes[i + 1],
        )
    }
}

/// Piecewise linear interpolant, extended linearly past both ends.
///
/// A single node yields a constant.
#[derive(Debug, Clone)]
pub(crate) struct Linear {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Linear {
    pub(crate) fn new(x: Vec<f64>, y: Vec<f64>) -> error::Result<Self> {
        validate_nodes(&x, &y, 1)?;
        Ok(Self { x, y })
    }

    pub(crate) fn value(&self, xq: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return self.y[0];
        }
        let i = if xq < self.x[0] {
            0
        } else if xq > self.x[n - 1] {
            n - 2
        } else {
            interval_index(&self.x, xq)
        };
        let slope = (self.y[i + 1] - self.y[i]) / (self.x[i + 1] - self.x[i]);
        self.y[i] + slope * (xq - self.x[i])
    }
}

/// `n` evenly spaced points from `lower` to `upper` inclusive.
///
/// Values within rounding of zero are snapped to exactly zero so that
/// symmetric grids carry an exact ATM node.
pub(crate) fn linspace(lower: f64, upper: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lower],
        _ => {
            let scale = lower.abs().max(upper.abs());
            (0..n)
                .map(|i| {
                    let v = lower + (upper - lower) * i as f64 / (n - 1) as f64;
                    if v.abs() <= 1e-14 * scale { 0.0 } else { v }
                })
                .collect()
        }
    }
}

/// Sort `(x, y)` pairs by `x` and average `y` over exactly equal `x`.
pub(crate) fn collapse_duplicates(mut points: Vec<(f64, f64)>) -> (Vec<f64>, Vec<f64>) {
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut xs: Vec<f64> = Vec::with_capacity(points.len());
    let mut ys: Vec<f64> = Vec::with_capacity(points.len());
    let mut counts: Vec<usize> = Vec::with_capacity(points.len());
    for (x, y) in points {
        match xs.last() {
            Some(&last) if last == x => {
                let j = ys.len() - 1;
                ys[j] += y;
                counts[j] += 1;
            }
            _ => {
                xs.push(x);
                ys.push(y);
                counts.push(1);
            }
        }
    }
    for (y, c) in ys.iter_mut().zip(&counts) {
        *y /= *c as f64;
    }
    (xs, ys)
}

/// Index `i` with `x[i] <= xq <= x[i + 1]`, for `xq` inside the node range.
fn interval_index(x: &[f64], xq: f64) -> usize {
    let n = x.len();
    x.partition_point(|&v| v <= xq).saturating_sub(1).min(n - 2)
}

fn validate_nodes(x: &[f64], y: &[f64], min_len: usize) -> error::Result<()> {
    if x.len() != y.len() {
        return Err(VolSurfError::InvalidInput {
            message: format!(
                "x and y must have the same length, got {} and {}",
                x.len(),
                y.len()
            ),
        });
    }
    if x.len() < min_len {
        return Err(VolSurfError::InvalidInput {
            message: format!("at least {min_len} interpolation nodes required, got {}", x.len()),
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(VolSurfError::InvalidInput {
            message: "interpolation nodes must be finite".into(),
        });
    }
    if let Some(i) = x.windows(2).position(|w| w[1] <= w[0]) {
        return Err(VolSurfError::InvalidInput {
            message: format!(
                "abscissas must be strictly increasing, but x[{}]={} >= x[{}]={}",
                i,
                x[i],
                i + 1,
                x[i + 1]
            ),
        });
    }
    Ok(())
}

/// Node derivatives: weighted harmonic mean of neighbouring secants in the
/// interior (zero at local extrema), three-point shape-preserving ends.
fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 2 {
        let m = (y[1] - y[0]) / (x[1] - x[0]);
        return vec![m, m];
    }

    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }

    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

fn end_slope(h0: f64, h1: f64, delta0: f64, delta1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * delta0 - h0 * delta1) / (h0 + h1);
    if d.signum() != delta0.signum() || delta0 == 0.0 {
        0.0
    } else if delta0.signum() != delta1.signum() && d.abs() > 3.0 * delta0.abs() {
        3.0 * delta0
    } else {
        d
    }
}
