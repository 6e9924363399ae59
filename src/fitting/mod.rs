// file: src/fitting/mod.rs
// description: ISF model fitting entry points
// reference: generalised curve fitting over the supported decay models

pub mod amplitude;
pub mod lm;
pub mod models;

pub use amplitude::{compute_ab, compute_ab_from_spectrum, compute_isf, ddm_matrix_model, find_mean_sq_fft};
pub use lm::{CurveFit, CurveFitOptions, curve_fit};
pub use models::{FitModel, SUPPORTED_MODELS, double_exp, schultz, single_exp};

use crate::error::{DdmError, Result};
use tracing::debug;

/// True when the data is well described by a straight line from 1 with the end-to-end gradient.
pub fn is_linear(isf: &[f64], taus: &[f64]) -> bool {
    if isf.len() != taus.len() {
        return false;
    }
    let (Some(first), Some(last), Some(t_first), Some(t_last)) = (isf.first(), isf.last(), taus.first(), taus.last())
    else {
        return false;
    };
    let span = t_last - t_first;
    if span == 0.0 {
        return false;
    }

    let gradient = (last - first) / span;
    let intercept = 1.0;
    let residual = isf
        .iter()
        .zip(taus)
        .map(|(f, t)| {
            let r = f - (gradient * t + intercept);
            r * r
        })
        .sum::<f64>()
        .sqrt();

    residual < 0.1
}

/// Fits one ISF curve with the named model, returning parameters and their standard errors.
pub fn gen_fit(
    isf: &[f64],
    taus: &[f64],
    model: &str,
    options: CurveFitOptions,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let model: FitModel = model.parse()?;
    fit_model(isf, taus, model, options)
}

pub fn fit_model(
    isf: &[f64],
    taus: &[f64],
    model: FitModel,
    options: CurveFitOptions,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if isf.len() != taus.len() {
        return Err(DdmError::ShapeMismatch(format!(
            "{} ISF values but {} lag times",
            isf.len(),
            taus.len()
        )));
    }
    if isf.is_empty() {
        return Err(DdmError::FitFailed("no data to fit".to_string()));
    }

    if is_linear(isf, taus) {
        return Err(DdmError::LinearDecorrelation);
    }

    let (lower, upper) = model.bounds();
    let mut best: Option<CurveFit> = None;
    let mut last_error = None;

    for guess in model.initial_guesses(isf, taus) {
        match curve_fit(
            |t, p| model.evaluate(t, p),
            taus,
            isf,
            &guess,
            &lower,
            &upper,
            options,
        ) {
            Ok(fit) => {
                debug!("{} start {:?} -> ssr {:e}", model, guess, fit.ssr);
                if best.as_ref().is_none_or(|b| fit.ssr < b.ssr) {
                    best = Some(fit);
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    match best {
        Some(fit) => {
            let errors = fit.errors();
            Ok((fit.params, errors))
        }
        None => Err(last_error.unwrap_or_else(|| DdmError::FitFailed("no starting point".to_string()))),
    }
}
