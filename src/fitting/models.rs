// file: src/fitting/models.rs
// description: ISF decay models and their parameter bounds and starting points
// reference: stretched-exponential and Schultz-distributed velocity models for DDM

use crate::error::{DdmError, Result};
use std::f64::consts::E;
use std::fmt;
use std::str::FromStr;

pub const SUPPORTED_MODELS: [&str; 3] = ["singleExp", "doubleExp", "schultz"];

/// Smallest value allowed for decay times, stretching exponents and the Schultz number.
const POSITIVE_FLOOR: f64 = 1e-12;

/// `exp(-(t / tau)^s)`
pub fn single_exp(t: f64, tau: f64, s: f64) -> f64 {
    (-(t / tau).powf(s)).exp()
}

/// `n exp(-(t / tau1)^s1) + (1 - n) exp(-(t / tau2)^s2)`
pub fn double_exp(t: f64, tau1: f64, tau2: f64, n: f64, s1: f64, s2: f64) -> f64 {
    n * single_exp(t, tau1, s1) + (1.0 - n) * single_exp(t, tau2, s2)
}

/// ISF for a population mixing diffusion (`tau1`, `s`) with ballistic motion whose speeds
/// follow a Schultz distribution of order `z` (`tau2`), `n` being the ballistic fraction.
pub fn schultz(t: f64, tau1: f64, tau2: f64, n: f64, s: f64, z: f64) -> f64 {
    let v_dist = if t == 0.0 {
        1.0
    } else {
        let theta = (t / tau2) / (z + 1.0);
        ((z + 1.0) / ((z * t) / tau2)) * (z * theta.atan()).sin()
            / (1.0 + theta * theta).powf(z / 2.0)
    };
    (-(t / tau1).powf(s)).exp() * ((1.0 - n) + n * v_dist)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitModel {
    SingleExp,
    DoubleExp,
    Schultz,
}

impl FitModel {
    pub fn name(&self) -> &'static str {
        match self {
            FitModel::SingleExp => "singleExp",
            FitModel::DoubleExp => "doubleExp",
            FitModel::Schultz => "schultz",
        }
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            FitModel::SingleExp => &["tau", "s"],
            FitModel::DoubleExp => &["tau1", "tau2", "n", "s1", "s2"],
            FitModel::Schultz => &["tau1", "tau2", "n", "s", "z"],
        }
    }

    pub fn evaluate(&self, t: f64, p: &[f64]) -> f64 {
        match self {
            FitModel::SingleExp => single_exp(t, p[0], p[1]),
            FitModel::DoubleExp => double_exp(t, p[0], p[1], p[2], p[3], p[4]),
            FitModel::Schultz => schultz(t, p[0], p[1], p[2], p[3], p[4]),
        }
    }

    /// Lower and upper parameter bounds.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let inf = f64::INFINITY;
        match self {
            FitModel::SingleExp => (vec![POSITIVE_FLOOR; 2], vec![inf; 2]),
            FitModel::DoubleExp => (
                vec![POSITIVE_FLOOR, POSITIVE_FLOOR, 0.0, 1.0, 1.0],
                vec![inf, inf, 1.0, 2.0, 2.0],
            ),
            FitModel::Schultz => (
                vec![POSITIVE_FLOOR, POSITIVE_FLOOR, -inf, POSITIVE_FLOOR, POSITIVE_FLOOR],
                vec![inf; 5],
            ),
        }
    }

    /// Starting points for the optimiser, derived from where the data first decays below 1/e.
    pub fn initial_guesses(&self, isf: &[f64], taus: &[f64]) -> Vec<Vec<f64>> {
        let t_e = decay_time_estimate(isf, taus);
        match self {
            FitModel::SingleExp => vec![vec![t_e, 1.0]],
            FitModel::DoubleExp => {
                let mut guesses = Vec::new();
                for fast in [t_e / 10.0, t_e / 3.0] {
                    for slow in [t_e, 3.0 * t_e] {
                        guesses.push(vec![fast, slow, 0.5, 1.5, 1.5]);
                    }
                }
                guesses
            }
            FitModel::Schultz => vec![
                vec![t_e, t_e, 0.5, 1.0, 10.0],
                vec![3.0 * t_e, t_e / 3.0, 0.5, 1.0, 10.0],
                vec![t_e / 3.0, 3.0 * t_e, 0.5, 1.0, 10.0],
            ],
        }
    }
}

impl fmt::Display for FitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FitModel {
    type Err = DdmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "singleExp" => Ok(FitModel::SingleExp),
            "doubleExp" => Ok(FitModel::DoubleExp),
            "schultz" => Ok(FitModel::Schultz),
            other => Err(DdmError::UnsupportedFitFunction {
                name: other.to_string(),
                supported: SUPPORTED_MODELS.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

/// Lag time at which `isf` first crosses `1/e`, linearly interpolated.
pub fn decay_time_estimate(isf: &[f64], taus: &[f64]) -> f64 {
    let threshold = 1.0 / E;
    let fallback = taus
        .iter()
        .copied()
        .filter(|t| *t > 0.0)
        .fold(f64::NAN, f64::max);

    for i in 1..isf.len().min(taus.len()) {
        if isf[i] < threshold && isf[i - 1] >= threshold {
            let span = isf[i - 1] - isf[i];
            let frac = if span > 0.0 {
                (isf[i - 1] - threshold) / span
            } else {
                0.0
            };
            let estimate = taus[i - 1] + frac * (taus[i] - taus[i - 1]);
            if estimate > 0.0 {
                return estimate;
            }
        }
    }

    if fallback.is_finite() { fallback } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_exp_values() {
        assert_eq!(single_exp(0.0, 2.0, 1.0), 1.0);
        assert!((single_exp(2.0, 2.0, 1.0) - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_double_exp_reduces_to_single() {
        let t = 3.5;
        assert!((double_exp(t, 2.0, 9.0, 1.0, 1.3, 1.0) - single_exp(t, 2.0, 1.3)).abs() < 1e-12);
    }

    #[test]
    fn test_schultz_limits() {
        // at zero lag the velocity term tends to one
        assert_eq!(schultz(0.0, 1.0, 1.0, 0.5, 1.0, 10.0), 1.0);
        // without ballistic fraction it is a stretched exponential
        let t = 1.7;
        assert!((schultz(t, 2.0, 5.0, 0.0, 1.2, 4.0) - single_exp(t, 2.0, 1.2)).abs() < 1e-12);
        // small lag continuity
        assert!((schultz(1e-9, 1.0, 1.0, 0.5, 1.0, 10.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_models() {
        assert_eq!("doubleExp".parse::<FitModel>().unwrap(), FitModel::DoubleExp);
        let err = "foo".parse::<FitModel>().unwrap_err();
        assert!(err.to_string().contains("fitting function"));
        assert!(err.to_string().contains("schultz"));
    }

    #[test]
    fn test_decay_time_estimate() {
        let taus: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let isf: Vec<f64> = taus.iter().map(|t| single_exp(*t, 20.0, 1.0)).collect();
        assert!((decay_time_estimate(&isf, &taus) - 20.0).abs() < 0.5);

        let flat = vec![1.0; 100];
        assert_eq!(decay_time_estimate(&flat, &taus), 99.0);
    }

    #[test]
    fn test_bounds_match_parameter_count() {
        for model in [FitModel::SingleExp, FitModel::DoubleExp, FitModel::Schultz] {
            let (lower, upper) = model.bounds();
            assert_eq!(lower.len(), model.param_names().len());
            assert_eq!(upper.len(), model.param_names().len());
            for guess in model.initial_guesses(&[1.0, 0.1], &[1.0, 2.0]) {
                assert_eq!(guess.len(), lower.len());
            }
        }
    }
}
