//! Convex hull of observed `(log_moneyness, tenor)` pairs.
//!
//! Andrew's monotone chain. The materialized grid only reports cells inside
//! the hull, so interpolated regions are shown and extrapolated corners are not.
//!
//! # References
//! - Andrew, A.M. "Another Efficient Algorithm for Convex Hulls in Two Dimensions" (1979)

use serde::{Deserialize, Serialize};

/// Slack for points on the hull boundary.
const CONTAINS_TOLERANCE: f64 = 1e-9;

/// Convex polygon in counter-clockwise order.
///
/// Degenerates to a segment for collinear input (a single maturity) and to a
/// point for a single observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull {
    vertices: Vec<(f64, f64)>,
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

impl ConvexHull {
    /// Hull of `points`; non-finite points are ignored.
    pub fn new(points: &[(f64, f64)]) -> Self {
        let mut pts: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|p| p.0.is_finite() && p.1.is_finite())
            .collect();
        pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        pts.dedup();
        if pts.len() < 3 {
            return Self { vertices: pts };
        }

        let mut lower: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
        for &p in &pts {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(p);
        }
        let mut upper: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
        for &p in pts.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { vertices: lower }
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Whether `point` lies inside or on the hull.
    pub fn contains(&self, point: (f64, f64)) -> bool {
        match self.vertices.len() {
            0 => false,
            1 => {
                let v = self.vertices[0];
                (point.0 - v.0).abs() <= CONTAINS_TOLERANCE
                    && (point.1 - v.1).abs() <= CONTAINS_TOLERANCE
            }
            2 => on_segment(self.vertices[0], self.vertices[1], point),
            n => (0..n).all(|i| {
                cross(self.vertices[i], self.vertices[(i + 1) % n], point) >= -CONTAINS_TOLERANCE
            }),
        }
    }
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0);
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt() <= CONTAINS_TOLERANCE
}
