//! Materialized `(log_moneyness, tenor) → vol` grid.
//!
//! Produced by [`InterpolatedSurface::grid`](super::InterpolatedSurface::grid).
//! Cells outside the convex hull of the observed data are `None`. The optional
//! Gaussian blur is cosmetic: it does not preserve any no-arbitrage property
//! and its output must not feed back into a surface.

use serde::{Deserialize, Serialize};

use crate::error;
use crate::validate::validate_positive;

/// One present grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub log_moneyness: f64,
    pub tenor: f64,
    pub vol: f64,
}

/// Vols on a rectangular grid, rows by tenor and columns by log-moneyness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceGrid {
    log_moneyness: Vec<f64>,
    tenors: Vec<f64>,
    vols: Vec<Vec<Option<f64>>>,
    smoothed: bool,
}

impl SurfaceGrid {
    pub(crate) fn new(log_moneyness: Vec<f64>, tenors: Vec<f64>, vols: Vec<Vec<Option<f64>>>) -> Self {
        Self {
            log_moneyness,
            tenors,
            vols,
            smoothed: false,
        }
    }

    pub fn log_moneyness(&self) -> &[f64] {
        &self.log_moneyness
    }

    pub fn tenors(&self) -> &[f64] {
        &self.tenors
    }

    /// Rows of cells, one row per tenor.
    pub fn vols(&self) -> &[Vec<Option<f64>>] {
        &self.vols
    }

    /// Cell at tenor row `i` and log-moneyness column `j`.
    pub fn vol(&self, i: usize, j: usize) -> Option<f64> {
        self.vols.get(i).and_then(|row| row.get(j)).copied().flatten()
    }

    /// Whether a blur has been applied.
    pub fn is_smoothed(&self) -> bool {
        self.smoothed
    }

    /// Present cells as `(log_moneyness, tenor, vol)` triples, row-major.
    pub fn points(&self) -> Vec<GridPoint> {
        self.tenors
            .iter()
            .zip(&self.vols)
            .flat_map(|(&tenor, row)| {
                self.log_moneyness
                    .iter()
                    .zip(row)
                    .filter_map(move |(&log_moneyness, vol)| {
                        vol.map(|vol| GridPoint {
                            log_moneyness,
                            tenor,
                            vol,
                        })
                    })
            })
            .collect()
    }

    /// Separable Gaussian blur with width `sigma` in cells.
    ///
    /// Each pass is normalized over the present cells in the kernel window, so
    /// a constant grid stays constant and absent cells stay absent.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`](crate::VolSurfError::InvalidInput)
    /// for a non-positive `sigma`.
    pub fn smoothed(&self, sigma: f64) -> error::Result<Self> {
        validate_positive(sigma, "sigma")?;
        let longest = self.log_moneyness.len().max(self.tenors.len());
        let kernel = gaussian_kernel(sigma, longest.saturating_sub(1).max(1));

        let rows: Vec<Vec<Option<f64>>> = self.vols.iter().map(|row| blur_line(row, &kernel)).collect();

        let n_cols = self.log_moneyness.len();
        let mut out = rows.clone();
        for j in 0..n_cols {
            let column: Vec<Option<f64>> = rows.iter().map(|row| row[j]).collect();
            for (i, v) in blur_line(&column, &kernel).into_iter().enumerate() {
                out[i][j] = v;
            }
        }

        Ok(Self {
            log_moneyness: self.log_moneyness.clone(),
            tenors: self.tenors.clone(),
            vols: out,
            smoothed: true,
        })
    }
}

/// Weights for offsets `0..=radius`, radius `ceil(3σ)` capped at `max_radius`.
///
/// The centre weight is always 1.
fn gaussian_kernel(sigma: f64, max_radius: usize) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().clamp(1.0, max_radius as f64) as usize;
    (0..=radius)
        .map(|d| {
            let z = d as f64 / sigma;
            (-0.5 * z * z).exp()
        })
        .collect()
}

fn blur_line(line: &[Option<f64>], kernel: &[f64]) -> Vec<Option<f64>> {
    let radius = kernel.len() - 1;
    (0..line.len())
        .map(|i| {
            line[i]?;
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(line.len() - 1);
            let (mut sum, mut weight) = (0.0, 0.0);
            for (j, v) in line.iter().enumerate().take(hi + 1).skip(lo) {
                if let Some(v) = v {
                    let k = kernel[i.abs_diff(j)];
                    sum += k * v;
                    weight += k;
                }
            }
            Some(sum / weight)
        })
        .collect()
}
