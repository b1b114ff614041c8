//! Internal root finding for implied volatility inversion.

/// Configuration for the bracketed Brent root finder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BrentConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Absolute tolerance on the abscissa.
    pub x_tol: f64,
}

impl Default for BrentConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            x_tol: 1e-12,
        }
    }
}

/// Why a bracketed search produced no root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RootFailure {
    /// `f(lower)` and `f(upper)` share a sign (or one is not finite).
    NoBracket { f_lower: f64, f_upper: f64 },
    /// Iteration cap reached before the bracket shrank below tolerance.
    MaxIterations { last: f64 },
}

/// Find a root of `f` on `[lower, upper]` with Brent's method.
///
/// Mixes inverse quadratic interpolation, secant steps and bisection; the
/// bracket `[b, c]` always contains a sign change.
pub(crate) fn brent_root<F>(
    f: F,
    lower: f64,
    upper: f64,
    config: &BrentConfig,
) -> Result<f64, RootFailure>
where
    F: Fn(f64) -> f64,
{
    let mut a = lower;
    let mut b = upper;
    let mut fa = f(a);
    let mut fb = f(b);

    if !fa.is_finite() || !fb.is_finite() || fa * fb > 0.0 {
        return Err(RootFailure::NoBracket {
            f_lower: fa,
            f_upper: fb,
        });
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;

    for _ in 0..config.max_iter {
        if (fb > 0.0 && fc > 0.0) || (fb < 0.0 && fc < 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        // Keep b as the best estimate.
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * config.x_tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant
                (2.0 * xm * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation
                let q0 = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q0 * (q0 - r) - (b - a) * (r - 1.0)),
                    (q0 - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(xm) };
        fb = f(b);
    }

    Err(RootFailure::MaxIterations { last: b })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_cubic_root() {
        let f = |x: f64| x * x * x - x - 2.0;
        let root = brent_root(f, 1.0, 2.0, &BrentConfig::default()).unwrap();
        assert_abs_diff_eq!(f(root), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn finds_sqrt_two() {
        let root = brent_root(|x| x * x - 2.0, 0.0, 2.0, &BrentConfig::default()).unwrap();
        assert_abs_diff_eq!(root, std::f64::consts::SQRT_2, epsilon = 1e-11);
    }

    #[test]
    fn root_at_endpoint() {
        let root = brent_root(|x| x - 1.0, 1.0, 3.0, &BrentConfig::default()).unwrap();
        assert_eq!(root, 1.0);
    }

    #[test]
    fn no_sign_change_is_no_bracket() {
        let result = brent_root(|x| x * x + 1.0, -1.0, 1.0, &BrentConfig::default());
        assert!(matches!(result, Err(RootFailure::NoBracket { .. })));
    }

    #[test]
    fn nan_endpoint_is_no_bracket() {
        let result = brent_root(|x: f64| (x - 2.0).ln(), 0.0, 5.0, &BrentConfig::default());
        assert!(matches!(result, Err(RootFailure::NoBracket { .. })));
    }

    #[test]
    fn iteration_cap_reported() {
        let config = BrentConfig {
            max_iter: 1,
            x_tol: 1e-15,
        };
        let result = brent_root(|x: f64| x.tanh() - 0.3, -5.0, 5.0, &config);
        assert!(matches!(result, Err(RootFailure::MaxIterations { .. })));
    }
}
