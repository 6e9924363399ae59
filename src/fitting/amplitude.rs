// file: src/fitting/amplitude.rs
// description: estimation of the DDM amplitude A(q) and noise floor B, and ISF conversion
// reference: D(q, tau) = A(q) (1 - f(q, tau)) + B

use crate::error::{DdmError, Result};
use crate::models::{DdmMatrix, ImageStack};
use crate::processing::{Fft2, fftshift, radial_profile, spectrum_centre};
use rayon::prelude::*;

/// Mean over all frames of the shifted `2 |FFT|^2`.
pub fn find_mean_sq_fft(stack: &ImageStack) -> Result<Vec<f64>> {
    if stack.frames == 0 || stack.frame_len() == 0 {
        return Err(DdmError::Validation("image stack is empty".to_string()));
    }

    let fft = Fft2::new(stack.height, stack.width);
    let len = stack.frame_len();

    let sum = stack
        .data
        .par_chunks_exact(len)
        .map(|frame| {
            let sq: Vec<f64> = fft
                .forward(frame)
                .iter()
                .map(|c| 2.0 * c.norm_sqr() as f64)
                .collect();
            fftshift(&sq, stack.height, stack.width)
        })
        .reduce(
            || vec![0.0; len],
            |mut acc, frame| {
                acc.iter_mut().zip(frame).for_each(|(a, v)| *a += v);
                acc
            },
        );

    let frames = stack.frames as f64;
    Ok(sum.into_iter().map(|v| v / frames).collect())
}

/// Half-open radial window `[len - tail_start, len - tail_end)` used for the noise floor,
/// clamped at zero the way negative slice bounds behave.
pub fn noise_window(len: usize, tail_start: usize, tail_end: usize) -> std::ops::Range<usize> {
    len.saturating_sub(tail_start)..len.saturating_sub(tail_end)
}

/// Returns `(A(q), B)` from the radially averaged mean power spectrum.
pub fn compute_ab_from_spectrum(
    sq_fft_mean: &[f64],
    height: usize,
    width: usize,
    tail_start: usize,
    tail_end: usize,
) -> Result<(Vec<f64>, f64)> {
    let profile = radial_profile(sq_fft_mean, height, width, spectrum_centre(height, width));
    let window = noise_window(profile.len(), tail_start, tail_end);

    if window.is_empty() {
        return Err(DdmError::Validation(format!(
            "radial profile of {} bins is too short for a noise window of [-{}, -{})",
            profile.len(),
            tail_start,
            tail_end
        )));
    }

    let tail = &profile[window];
    let b = tail.iter().sum::<f64>() / tail.len() as f64;
    let a = profile.iter().map(|v| v - b).collect();
    Ok((a, b))
}

pub fn compute_ab(stack: &ImageStack, tail_start: usize, tail_end: usize) -> Result<(Vec<f64>, f64)> {
    let mean = find_mean_sq_fft(stack)?;
    compute_ab_from_spectrum(&mean, stack.height, stack.width, tail_start, tail_end)
}

/// Model DDM matrix row for a given ISF.
pub fn ddm_matrix_model(isf: &[f64], a: f64, b: f64) -> Vec<f64> {
    isf.iter().map(|f| a * (1.0 - f) + b).collect()
}

/// `1 - (D - B) / A`, returned as `isf[q][tau_index]`.
pub fn compute_isf(matrix: &DdmMatrix, a: &[f64], b: f64) -> Result<Vec<Vec<f64>>> {
    if matrix.q_bins() != a.len() {
        return Err(DdmError::ShapeMismatch(format!(
            "matrix has {} q bins but A(q) has {}",
            matrix.q_bins(),
            a.len()
        )));
    }

    Ok((0..a.len())
        .map(|q| {
            matrix
                .values
                .iter()
                .map(|row| 1.0 - (row[q] - b) / a[q])
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_noise_window_clamps_like_slices() {
        assert_eq!(noise_window(300, 100, 50), 200..250);
        assert_eq!(noise_window(80, 100, 50), 0..30);
        assert!(noise_window(40, 100, 50).is_empty());
    }

    #[test]
    fn test_mean_sq_fft_of_constant_stack() {
        let stack = ImageStack::new(3, 4, 4, vec![1.0; 48]).unwrap();
        let mean = find_mean_sq_fft(&stack).unwrap();
        // DC term 2 * 16^2 lands at the centre (2, 2) after shifting
        assert!((mean[2 * 4 + 2] - 512.0).abs() < 1e-3);
        assert!(mean.iter().enumerate().all(|(i, v)| i == 10 || v.abs() < 1e-3));
    }

    #[test]
    fn test_compute_ab_from_flat_spectrum() {
        let (a, b) = compute_ab_from_spectrum(&[5.0; 64], 8, 8, 4, 1).unwrap();
        assert_eq!(b, 5.0);
        assert!(a.iter().all(|v| *v == 0.0));
        assert!(compute_ab_from_spectrum(&[5.0; 64], 8, 8, 100, 50).is_err());
    }

    #[test]
    fn test_isf_inverts_matrix_model() {
        let a = vec![10.0, 4.0];
        let b = 0.5;
        let isf_q0 = [0.9, 0.5];
        let isf_q1 = [0.8, 0.1];
        let row_q0 = ddm_matrix_model(&isf_q0, a[0], b);
        let row_q1 = ddm_matrix_model(&isf_q1, a[1], b);

        let matrix = DdmMatrix::new(
            vec![1, 2],
            vec![vec![row_q0[0], row_q1[0]], vec![row_q0[1], row_q1[1]]],
        )
        .unwrap();

        let isf = compute_isf(&matrix, &a, b).unwrap();
        assert_eq!(isf.len(), 2);
        for (got, want) in isf[0].iter().zip(isf_q0).chain(isf[1].iter().zip(isf_q1)) {
            assert!((got - want).abs() < 1e-12);
        }

        assert!(compute_isf(&matrix, &[1.0], b).is_err());
    }
}
