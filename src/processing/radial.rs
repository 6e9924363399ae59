// file: src/processing/radial.rs
// description: azimuthal averaging of 2-D spectra into radial q bins

/// Averages `data` over rings of integer radius around `centre` (row, column).
/// Bins that receive no pixels are reported as zero.
pub fn radial_profile(data: &[f64], height: usize, width: usize, centre: (f64, f64)) -> Vec<f64> {
    let mut sums: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();

    for row in 0..height {
        let dy = row as f64 - centre.0;
        for col in 0..width {
            let dx = col as f64 - centre.1;
            let r = (dy * dy + dx * dx).sqrt() as usize;
            if r >= sums.len() {
                sums.resize(r + 1, 0.0);
                counts.resize(r + 1, 0);
            }
            sums[r] += data[row * width + col];
            counts[r] += 1;
        }
    }

    sums.iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect()
}

/// Centre used for shifted spectra, `(height / 2, width / 2)`.
pub fn spectrum_centre(height: usize, width: usize) -> (f64, f64) {
    (height as f64 / 2.0, width as f64 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image_gives_constant_profile() {
        let profile = radial_profile(&[3.0; 64], 8, 8, spectrum_centre(8, 8));
        assert!(profile.iter().all(|&v| (v - 3.0).abs() < 1e-12));
        // farthest pixel (0, 0) sits at sqrt(32) from (4, 4)
        assert_eq!(profile.len(), 6);
    }

    #[test]
    fn test_profile_averages_rings() {
        // 3x3 with centre pixel 0 and ring pixels 1 / 2
        let data = [2.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0, 1.0, 2.0];
        let profile = radial_profile(&data, 3, 3, (1.0, 1.0));
        assert_eq!(profile, vec![0.0, 1.5]);
    }
}
