// file: src/processing/fft.rs
// description: two-dimensional forward FFT and spectrum shifting for row-major frames
// reference: https://docs.rs/rustfft

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Planned 2-D forward transform for frames of a fixed size.
#[derive(Clone)]
pub struct Fft2 {
    height: usize,
    width: usize,
    row_fft: Arc<dyn Fft<f32>>,
    col_fft: Arc<dyn Fft<f32>>,
}

impl Fft2 {
    pub fn new(height: usize, width: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let row_fft = planner.plan_fft_forward(width);
        let col_fft = planner.plan_fft_forward(height);

        Self {
            height,
            width,
            row_fft,
            col_fft,
        }
    }

    pub fn forward(&self, frame: &[f32]) -> Vec<Complex32> {
        let mut buffer: Vec<Complex32> = frame.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        self.row_fft.process(&mut buffer);

        let mut columns = transpose(&buffer, self.height, self.width);
        self.col_fft.process(&mut columns);

        transpose(&columns, self.width, self.height)
    }
}

fn transpose<T: Copy + Default>(data: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = vec![T::default(); data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// Moves the zero-frequency component to the centre of a row-major `height x width` buffer.
pub fn fftshift<T: Copy + Default>(data: &[T], height: usize, width: usize) -> Vec<T> {
    let mut out = vec![T::default(); data.len()];
    let (dh, dw) = (height / 2, width / 2);
    for r in 0..height {
        let dest_row = (r + dh) % height;
        for c in 0..width {
            out[dest_row * width + (c + dw) % width] = data[r * width + c];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_of_constant_frame_is_dc_only() {
        let fft = Fft2::new(4, 4);
        let spectrum = fft.forward(&[1.0; 16]);
        assert!((spectrum[0].re - 16.0).abs() < 1e-5);
        assert!(spectrum[1..].iter().all(|v| v.norm() < 1e-5));
    }

    #[test]
    fn test_fft_non_square_frame() {
        // single impulse at origin transforms to all ones
        let mut frame = vec![0.0; 6];
        frame[0] = 1.0;
        let spectrum = Fft2::new(2, 3).forward(&frame);
        assert!(spectrum.iter().all(|v| (v.re - 1.0).abs() < 1e-6 && v.im.abs() < 1e-6));
    }

    #[test]
    fn test_fftshift_even_and_odd() {
        // rows rotate by 1, columns by 1
        let data: Vec<i32> = (0..6).collect();
        assert_eq!(fftshift(&data, 2, 3), vec![5, 3, 4, 2, 0, 1]);
    }
}
