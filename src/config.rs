//! Engine configuration.
//!
//! A single immutable [`EngineConfig`] is threaded through every stage of the
//! build. It deserializes from partial documents (missing fields take their
//! defaults) and is checked once by [`EngineConfig::validate`] before use.

use serde::{Deserialize, Serialize};

use crate::error::{self, VolSurfError};
use crate::implied::MIN_VOL;
use crate::validate::{validate_non_negative, validate_positive};

/// Target log-moneyness grid for smile interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoneynessGrid {
    /// Lowest log-moneyness of the grid.
    pub lower: f64,
    /// Highest log-moneyness of the grid.
    pub upper: f64,
    /// Number of evenly spaced points, endpoints included.
    pub points: usize,
}

impl Default for MoneynessGrid {
    fn default() -> Self {
        Self {
            lower: -0.5,
            upper: 0.5,
            points: 101,
        }
    }
}

/// Resolution of the materialized surface grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceGridSpec {
    pub moneyness_points: usize,
    pub tenor_points: usize,
    /// Gaussian blur width in grid cells; `None` disables smoothing.
    pub smoothing_sigma: Option<f64>,
}

impl Default for SurfaceGridSpec {
    fn default() -> Self {
        Self {
            moneyness_points: 41,
            tenor_points: 25,
            smoothing_sigma: None,
        }
    }
}

/// Configuration for the whole surface construction pipeline.
///
/// # Examples
///
/// ```
/// use volsurf_engine::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "atm_epsilon": 0.03 }"#).unwrap();
/// assert_eq!(config.atm_epsilon, 0.03);
/// assert_eq!(config.blend_width, 0.05);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum traded volume for a quote to be admitted.
    pub min_volume: u64,
    /// Minimum open interest for a quote to be admitted.
    pub min_open_interest: u64,
    /// Half-width of the ATM band in log-moneyness.
    pub atm_epsilon: f64,
    /// Half-width of the put/call blending band in log-moneyness.
    pub blend_width: f64,
    /// Number of samples across the blending band.
    pub blend_samples: usize,
    /// Ceiling of the implied vol search and of surface output.
    pub max_implied_vol: f64,
    /// Maturities shorter than this (in years) are dropped.
    pub min_maturity: f64,
    /// Minimum number of target grid points inside a smile's observed domain.
    pub min_points_per_maturity: usize,
    pub moneyness_grid: MoneynessGrid,
    /// Floor applied to interpolated total variance.
    pub variance_floor: f64,
    /// Days per year for expiry year fractions.
    pub day_count_basis: f64,
    pub surface_grid: SurfaceGridSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_volume: 1,
            min_open_interest: 1,
            atm_epsilon: 0.02,
            blend_width: 0.05,
            blend_samples: 21,
            max_implied_vol: 5.0,
            min_maturity: 0.02,
            min_points_per_maturity: 5,
            moneyness_grid: MoneynessGrid::default(),
            variance_floor: 1e-8,
            day_count_basis: 365.0,
            surface_grid: SurfaceGridSpec::default(),
        }
    }
}

impl EngineConfig {
    /// Check every field for a usable value.
    ///
    /// # Errors
    /// Returns [`VolSurfError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> error::Result<()> {
        validate_positive(self.atm_epsilon, "atm_epsilon")?;
        validate_positive(self.blend_width, "blend_width")?;
        validate_positive(self.max_implied_vol, "max_implied_vol")?;
        validate_non_negative(self.min_maturity, "min_maturity")?;
        validate_positive(self.variance_floor, "variance_floor")?;
        validate_positive(self.day_count_basis, "day_count_basis")?;

        if self.max_implied_vol <= MIN_VOL {
            return Err(VolSurfError::InvalidInput {
                message: format!(
                    "max_implied_vol must exceed {MIN_VOL}, got {}",
                    self.max_implied_vol
                ),
            });
        }
        if self.blend_samples < 2 {
            return Err(VolSurfError::InvalidInput {
                message: format!("blend_samples must be at least 2, got {}", self.blend_samples),
            });
        }

        let grid = &self.moneyness_grid;
        if !grid.lower.is_finite() || !grid.upper.is_finite() || grid.lower >= grid.upper {
            return Err(VolSurfError::InvalidInput {
                message: format!(
                    "moneyness_grid bounds must be finite with lower < upper, got [{}, {}]",
                    grid.lower, grid.upper
                ),
            });
        }
        if grid.points < 2 {
            return Err(VolSurfError::InvalidInput {
                message: format!("moneyness_grid.points must be at least 2, got {}", grid.points),
            });
        }

        let surface = &self.surface_grid;
        if surface.moneyness_points < 2 || surface.tenor_points < 2 {
            return Err(VolSurfError::InvalidInput {
                message: format!(
                    "surface_grid needs at least 2x2 points, got {}x{}",
                    surface.moneyness_points, surface.tenor_points
                ),
            });
        }
        if let Some(sigma) = surface.smoothing_sigma {
            validate_positive(sigma, "surface_grid.smoothing_sigma")?;
        }
        Ok(())
    }
}
