// file: src/fitting/lm.rs
// description: bounded Levenberg-Marquardt least squares with parameter covariance
// reference: Marquardt-scaled damping, forward-difference jacobian, scaled (J^T J)^-1 covariance

use crate::error::{DdmError, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct CurveFitOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for CurveFitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CurveFit {
    pub params: Vec<f64>,
    /// Parameter covariance; infinite when the jacobian is rank deficient.
    pub covariance: Vec<Vec<f64>>,
    pub ssr: f64,
    pub iterations: usize,
}

impl CurveFit {
    pub fn errors(&self) -> Vec<f64> {
        (0..self.params.len())
            .map(|i| self.covariance[i][i].sqrt())
            .collect()
    }
}

/// Fits `f(x, p)` to `y` starting from `p0`, keeping parameters inside `lower..=upper`.
pub fn curve_fit<F>(
    f: F,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    lower: &[f64],
    upper: &[f64],
    options: CurveFitOptions,
) -> Result<CurveFit>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = p0.len();
    let m = x.len();

    if y.len() != m {
        return Err(DdmError::ShapeMismatch(format!(
            "{} x values but {} y values",
            m,
            y.len()
        )));
    }
    if m <= n {
        return Err(DdmError::FitFailed(format!(
            "{} data points are not enough to fit {} parameters",
            m, n
        )));
    }
    if lower.len() != n || upper.len() != n {
        return Err(DdmError::ShapeMismatch(
            "bounds do not match the number of parameters".to_string(),
        ));
    }

    let mut p = clamp(p0, lower, upper);
    let mut ssr = sum_squares(&f, x, y, &p);
    if !ssr.is_finite() {
        return Err(DdmError::FitFailed(
            "model is not finite at the starting point".to_string(),
        ));
    }

    let mut lambda = 1e-3;
    let mut iterations = 0;

    'outer: while iterations < options.max_iterations {
        iterations += 1;

        let jac = jacobian(&f, x, &p, lower, upper);
        let residuals: Vec<f64> = x.iter().zip(y).map(|(&xi, &yi)| yi - f(xi, &p)).collect();
        let (jtj, jtr) = normal_equations(&jac, &residuals, n);

        loop {
            let mut damped = jtj.clone();
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += lambda * jtj[i][i].max(1e-12);
            }

            let Some(step) = solve(damped, jtr.clone()) else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    break 'outer;
                }
                continue;
            };

            let candidate: Vec<f64> = p.iter().zip(&step).map(|(pi, di)| pi + di).collect();
            let candidate = clamp(&candidate, lower, upper);
            let candidate_ssr = sum_squares(&f, x, y, &candidate);

            if candidate_ssr.is_finite() && candidate_ssr < ssr {
                let reduction = ssr - candidate_ssr;
                let step_norm = norm(&p.iter().zip(&candidate).map(|(a, b)| a - b).collect::<Vec<_>>());

                p = candidate;
                let previous = ssr;
                ssr = candidate_ssr;
                lambda = (lambda / 10.0).max(1e-12);

                if reduction <= options.tolerance * previous
                    || step_norm <= options.tolerance * (norm(&p) + options.tolerance)
                    || ssr <= f64::MIN_POSITIVE
                {
                    break 'outer;
                }
                break;
            }

            lambda *= 10.0;
            if lambda > 1e16 {
                break 'outer;
            }
        }
    }

    debug!("curve fit finished after {} iterations, ssr = {:e}", iterations, ssr);

    let jac = jacobian(&f, x, &p, lower, upper);
    let zeros = vec![0.0; m];
    let (jtj, _) = normal_equations(&jac, &zeros, n);
    let scale = ssr / (m - n) as f64;
    let covariance = match invert(jtj) {
        Some(inv) => inv
            .into_iter()
            .map(|row| row.into_iter().map(|v| v * scale).collect())
            .collect(),
        None => vec![vec![f64::INFINITY; n]; n],
    };

    Ok(CurveFit {
        params: p,
        covariance,
        ssr,
        iterations,
    })
}

fn clamp(p: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    p.iter()
        .zip(lower.iter().zip(upper))
        .map(|(&v, (&lo, &hi))| v.max(lo).min(hi))
        .collect()
}

fn sum_squares<F>(f: &F, x: &[f64], y: &[f64], p: &[f64]) -> f64
where
    F: Fn(f64, &[f64]) -> f64,
{
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - f(xi, p);
            r * r
        })
        .sum()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Forward differences, stepping backwards at an upper bound. Row-major `m x n`.
fn jacobian<F>(f: &F, x: &[f64], p: &[f64], lower: &[f64], upper: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = p.len();
    let base: Vec<f64> = x.iter().map(|&xi| f(xi, p)).collect();
    let mut jac = vec![vec![0.0; n]; x.len()];

    for j in 0..n {
        let mut h = f64::EPSILON.sqrt() * p[j].abs().max(1e-8);
        if p[j] + h > upper[j] && p[j] - h >= lower[j] {
            h = -h;
        }
        let mut shifted = p.to_vec();
        shifted[j] += h;

        for (i, &xi) in x.iter().enumerate() {
            let d = (f(xi, &shifted) - base[i]) / h;
            jac[i][j] = if d.is_finite() { d } else { 0.0 };
        }
    }
    jac
}

fn normal_equations(jac: &[Vec<f64>], residuals: &[f64], n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut jtj = vec![vec![0.0; n]; n];
    let mut jtr = vec![0.0; n];

    for (row, &r) in jac.iter().zip(residuals) {
        for a in 0..n {
            jtr[a] += row[a] * r;
            for b in a..n {
                jtj[a][b] += row[a] * row[b];
            }
        }
    }
    for a in 0..n {
        for b in 0..a {
            jtj[a][b] = jtj[b][a];
        }
    }
    (jtj, jtr)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut out = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * out[k]).sum();
        out[row] = (b[row] - tail) / a[row][row];
    }
    Some(out)
}

fn invert(a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut columns = Vec::with_capacity(n);
    for i in 0..n {
        let mut unit = vec![0.0; n];
        unit[i] = 1.0;
        columns.push(solve(a.clone(), unit)?);
    }
    Some(
        (0..n)
            .map(|r| (0..n).map(|c| columns[c][r]).collect())
            .collect(),
    )
}
