//! Bracketed root-finding used by the IRR and breakeven calculations.

use std::fmt;

/// Solver configuration: absolute tolerance and iteration cap.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
        }
    }
}

/// A converged root plus iteration statistics.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    pub root: f64,
    pub iterations: usize,
    pub residual: f64,
}

/// Root-finding failure.
///
/// `Objective` carries an error raised by the objective function itself, so
/// callers whose objective re-runs a full model evaluation can propagate
/// engine errors through the solver.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError<E> {
    /// `f(a)` and `f(b)` have the same sign: no root is bracketed.
    InvalidBracket { a: f64, b: f64, fa: f64, fb: f64 },
    /// The iteration cap was reached without convergence.
    ConvergenceFailed { iterations: usize, residual: f64 },
    Objective(E),
}

impl<E: fmt::Display> fmt::Display for SolverError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidBracket { a, b, fa, fb } => {
                write!(f, "no root bracketed on [{a}, {b}]: f(a)={fa}, f(b)={fb}")
            }
            SolverError::ConvergenceFailed {
                iterations,
                residual,
            } => {
                write!(f, "no convergence after {iterations} iterations (residual {residual})")
            }
            SolverError::Objective(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for SolverError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Objective(e) => Some(e),
            _ => None,
        }
    }
}

/// Brent's method: bisection reliability with secant / inverse-quadratic
/// interpolation speed. The standard choice when no derivative is available.
///
/// Requires a sign change over `[a, b]`. The objective is fallible; any
/// error it returns aborts the search immediately.
#[allow(clippy::many_single_char_names)]
pub fn brent<F, E>(
    mut f: F,
    a: f64,
    b: f64,
    config: &SolverConfig,
) -> Result<SolverResult, SolverError<E>>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    let mut a = a;
    let mut b = b;
    let mut fa = f(a).map_err(SolverError::Objective)?;
    let mut fb = f(b).map_err(SolverError::Objective)?;

    if fa * fb > 0.0 {
        return Err(SolverError::InvalidBracket { a, b, fa, fb });
    }

    // Keep |f(a)| >= |f(b)| so b is always the best guess.
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for iteration in 0..config.max_iterations {
        if fb.abs() < config.tolerance || (b - a).abs() < config.tolerance {
            return Ok(SolverResult {
                root: b,
                iterations: iteration,
                residual: fb,
            });
        }

        let mut use_bisection = true;
        let mut s = 0.0;

        if (fa - fc).abs() > 1e-15 && (fb - fc).abs() > 1e-15 {
            // Inverse quadratic interpolation.
            let r = fb / fc;
            let p = fa / fc;
            let q = fa / fb;
            s = b - (q * (q - r) * (b - a) + (1.0 - r) * (b - c) * p)
                / ((q - 1.0) * (r - 1.0) * (p - 1.0));

            let m = (a + b) / 2.0;
            if s > m.min(b) && s < m.max(b) && (s - b).abs() < e.abs() / 2.0 {
                use_bisection = false;
            }
        } else if (fb - fa).abs() > 1e-15 {
            // Secant step.
            s = b - fb * (b - a) / (fb - fa);

            let m = (a + b) / 2.0;
            if s > m.min(b) && s < m.max(b) && (s - b).abs() < e.abs() / 2.0 {
                use_bisection = false;
            }
        }

        if use_bisection {
            s = (a + b) / 2.0;
            e = b - a;
            d = e;
        } else {
            e = d;
            d = s - b;
        }

        c = b;
        fc = fb;

        let fs = f(s).map_err(SolverError::Objective)?;

        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    Err(SolverError::ConvergenceFailed {
        iterations: config.max_iterations,
        residual: fb.abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn ok(f: impl Fn(f64) -> f64) -> impl FnMut(f64) -> Result<f64, Infallible> {
        move |x| Ok(f(x))
    }

    #[test]
    fn test_sqrt_2() {
        let result = brent(ok(|x| x * x - 2.0), 1.0, 2.0, &SolverConfig::default()).unwrap();
        assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_cubic() {
        let f = |x: f64| x * x * x - x - 2.0;
        let result = brent(ok(f), 1.0, 2.0, &SolverConfig::default()).unwrap();
        assert!(f(result.root).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_bracket() {
        let result = brent(ok(|x| x * x - 2.0), 2.0, 3.0, &SolverConfig::default());
        assert!(matches!(result, Err(SolverError::InvalidBracket { .. })));
    }

    #[test]
    fn test_objective_error_propagates() {
        let result = brent(|_x| Err::<f64, &str>("boom"), 0.0, 1.0, &SolverConfig::default());
        assert_eq!(result.unwrap_err(), SolverError::Objective("boom"));
    }

    #[test]
    fn test_converges_quickly() {
        let result = brent(ok(|x| x * x - 2.0), 1.0, 2.0, &SolverConfig::default()).unwrap();
        // Bisection alone would need ~34 iterations at this tolerance.
        assert!(result.iterations < 20);
    }
}
