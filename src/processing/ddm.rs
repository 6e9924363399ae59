// file: src/processing/ddm.rs
// description: DDM matrix computation from image stacks over a set of lag times
// reference: sequential and thread-pool backends over shared frame spectra

use crate::config::Backend;
use crate::error::{DdmError, Result};
use crate::models::{DdmMatrix, ImageStack};
use crate::processing::fft::{Fft2, fftshift};
use crate::processing::radial::{radial_profile, spectrum_centre};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;
use tracing::{debug, info, warn};

/// Lag times `1 .. frames / 2` (exclusive).
pub fn default_lag_times(frames: usize) -> Vec<usize> {
    (1..frames / 2).collect()
}

/// Checks lag times against the stack length, filling in the default range when empty.
pub fn resolve_lag_times(taus: &[usize], frames: usize) -> Result<Vec<usize>> {
    let taus = if taus.is_empty() {
        default_lag_times(frames)
    } else {
        taus.to_vec()
    };

    match taus.first() {
        None => Err(DdmError::InvalidLagTime(format!(
            "no lag times available for a stack of {} frames",
            frames
        ))),
        Some(&0) => Err(DdmError::InvalidLagTime(
            "Cannot calculate 0 lag time, please start range at 1".to_string(),
        )),
        Some(_) => {
            if let Some(&tau) = taus.iter().find(|&&tau| tau == 0 || tau >= frames) {
                return Err(DdmError::InvalidLagTime(format!(
                    "lag time {} is outside 1..{}",
                    tau, frames
                )));
            }
            Ok(taus)
        }
    }
}

pub fn resolve_backend(backend: Backend, workers: usize) -> Backend {
    match backend {
        Backend::Gpu => {
            warn!("GPU backend is not available, running analysis on CPU");
            Backend::Parallel
        }
        Backend::Auto if workers > 1 => Backend::Parallel,
        Backend::Auto => Backend::Sequential,
        other => other,
    }
}

/// Computes the DDM matrix of `stack` for the given lag times.
pub fn ddm(stack: &ImageStack, taus: &[usize], backend: Backend, workers: usize) -> Result<DdmMatrix> {
    ddm_with_progress(stack, taus, backend, workers, |_| {})
}

/// As [`ddm`], calling `on_tau` after each lag time finishes.
pub fn ddm_with_progress<F>(
    stack: &ImageStack,
    taus: &[usize],
    backend: Backend,
    workers: usize,
    on_tau: F,
) -> Result<DdmMatrix>
where
    F: Fn(usize) + Sync,
{
    if stack.height == 0 || stack.width == 0 {
        return Err(DdmError::Validation("image stack has empty frames".to_string()));
    }

    let taus = resolve_lag_times(taus, stack.frames)?;
    let backend = resolve_backend(backend, workers);

    let values = match backend {
        Backend::Sequential => {
            info!("Running analysis sequentially on CPU");
            ddm_sequential(stack, &taus, &on_tau)
        }
        _ => {
            info!("Running analysis on CPU with {} workers", workers);
            ddm_parallel(stack, &taus, workers, &on_tau)?
        }
    };

    DdmMatrix::new(taus, values)
}

fn ddm_sequential<F>(stack: &ImageStack, taus: &[usize], on_tau: &F) -> Vec<Vec<f64>>
where
    F: Fn(usize) + Sync,
{
    let fft = Fft2::new(stack.height, stack.width);
    let spectra: Vec<Vec<Complex32>> = stack.frames_iter().map(|f| fft.forward(f)).collect();

    taus.iter()
        .map(|&tau| {
            let row = calc_matrix(&spectra, tau, stack.height, stack.width);
            on_tau(tau);
            row
        })
        .collect()
}

fn ddm_parallel<F>(stack: &ImageStack, taus: &[usize], workers: usize, on_tau: &F) -> Result<Vec<Vec<f64>>>
where
    F: Fn(usize) + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| DdmError::Validation(format!("failed to build worker pool: {}", e)))?;

    let fft = Fft2::new(stack.height, stack.width);

    Ok(pool.install(|| {
        let spectra: Vec<Vec<Complex32>> = stack
            .data
            .par_chunks_exact(stack.frame_len())
            .map(|f| fft.forward(f))
            .collect();
        debug!("Computed {} frame spectra", spectra.len());

        taus.par_iter()
            .map(|&tau| {
                let row = calc_matrix(&spectra, tau, stack.height, stack.width);
                on_tau(tau);
                row
            })
            .collect()
    }))
}

/// Radially averaged `<|F(t) - F(t + tau)|^2>` over all frame pairs `tau` apart.
pub fn calc_matrix(spectra: &[Vec<Complex32>], tau: usize, height: usize, width: usize) -> Vec<f64> {
    let frames = spectra.len();
    let mut sum = vec![0.0f64; height * width];

    for t in 0..frames - tau {
        for ((acc, a), b) in sum.iter_mut().zip(&spectra[t]).zip(&spectra[t + tau]) {
            *acc += (a - b).norm_sqr() as f64;
        }
    }

    calc_radial(&fftshift(&sum, height, width), height, width, frames, tau)
}

/// Normalises a shifted difference spectrum by the number of pairs and averages it radially.
pub fn calc_radial(shifted: &[f64], height: usize, width: usize, frames: usize, tau: usize) -> Vec<f64> {
    let pairs = (frames - tau) as f64;
    let g_tau: Vec<f64> = shifted.iter().map(|v| v / pairs).collect();
    radial_profile(&g_tau, height, width, spectrum_centre(height, width))
}
