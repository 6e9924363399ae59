// file: src/simulation/brownian.rs
// description: 2-D Brownian particle tracks with optional drift
// reference: Stokes-Einstein diffusion and gaussian increments

use crate::config::SimulationConfig;
use crate::error::{DdmError, Result};
use crate::models::Tracks;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

const BOLTZMANN: f64 = 1.38e-23;

/// Stokes-Einstein diffusion coefficient in m^2/s for a sphere of diameter `particle_size`
/// (m) in a medium of viscosity `eta` (Pa s) at temperature `temperature` (K).
pub fn get_diffusion_coefficient(particle_size: f64, eta: f64, temperature: f64) -> f64 {
    BOLTZMANN * temperature / (3.0 * PI * eta * particle_size)
}

/// Tracks in pixels with shape `(n_particles, 2, steps)`.
///
/// Start positions are spread over twice the window in each direction so particles drift
/// in from outside; every step adds `sqrt(2 D tau) (N(0, 1) + drift) / pixel_size`.
pub fn generate_tracks<R: Rng + ?Sized>(params: &SimulationConfig, diffusion: f64, rng: &mut R) -> Result<Tracks> {
    if params.steps == 0 {
        return Err(DdmError::Validation("steps must be greater than zero".to_string()));
    }
    if params.window.0 == 0 || params.window.1 == 0 {
        return Err(DdmError::Validation("window must be non-empty".to_string()));
    }
    if !(diffusion >= 0.0) {
        return Err(DdmError::Validation(format!(
            "diffusion coefficient must be non-negative, got {}",
            diffusion
        )));
    }

    let k = (2.0 * diffusion * params.tau).sqrt();
    let extent = [
        (params.window.0 as f64 * 2.0).round(),
        (params.window.1 as f64 * 2.0).round(),
    ];
    let drift = [params.drift.0, params.drift.1];

    let mut tracks = Tracks::zeros(params.n_particles, params.steps);
    for particle in 0..params.n_particles {
        for axis in 0..2 {
            let mut position = rng.gen_range(-extent[axis]..extent[axis]);
            tracks.set(particle, axis, 0, position);

            for step in 1..params.steps {
                let noise: f64 = rng.sample(StandardNormal);
                position += k * (noise + drift[axis]) / params.pixel_size;
                tracks.set(particle, axis, step, position);
            }
        }
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_default_diffusion_coefficient() {
        let d = get_diffusion_coefficient(1e-6, 1e-3, 293.0);
        assert!((d - 4.29e-13).abs() < 1e-15);
    }

    #[test]
    fn test_generate_tracks_shape() {
        let params = SimulationConfig {
            n_particles: 10,
            steps: 100,
            ..SimulationConfig::default()
        };
        let d = get_diffusion_coefficient(1e-6, 1e-3, 293.0);
        let tracks = generate_tracks(&params, d, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(tracks.shape(), (10, 2, 100));

        for p in 0..10 {
            assert!(tracks.get(p, 0, 0).abs() <= 1024.0);
            assert!(tracks.get(p, 1, 0).abs() <= 1024.0);
        }
    }

    #[test]
    fn test_drift_without_diffusion_is_static() {
        let params = SimulationConfig {
            n_particles: 3,
            steps: 5,
            drift: (1.0, 1.0),
            ..SimulationConfig::default()
        };
        let tracks = generate_tracks(&params, 0.0, &mut StdRng::seed_from_u64(2)).unwrap();
        for p in 0..3 {
            assert_eq!(tracks.get(p, 0, 0), tracks.get(p, 0, 4));
        }
    }

    #[test]
    fn test_mean_squared_displacement_matches_diffusion() {
        let params = SimulationConfig {
            n_particles: 2000,
            steps: 11,
            drift: (0.0, 0.0),
            ..SimulationConfig::default()
        };
        let d = get_diffusion_coefficient(1e-6, 1e-3, 293.0);
        let tracks = generate_tracks(&params, d, &mut StdRng::seed_from_u64(3)).unwrap();

        // per-axis MSD after 10 steps is 2 D (10 tau), in pixels^2
        let expected = 2.0 * d * 10.0 * params.tau / (params.pixel_size * params.pixel_size);
        let msd: f64 = (0..params.n_particles)
            .map(|p| (tracks.get(p, 0, 10) - tracks.get(p, 0, 0)).powi(2))
            .sum::<f64>()
            / params.n_particles as f64;
        assert!((msd - expected).abs() < 0.1 * expected, "msd {} vs {}", msd, expected);
    }

    #[test]
    fn test_rejects_empty_simulation() {
        let params = SimulationConfig {
            steps: 0,
            ..SimulationConfig::default()
        };
        assert!(generate_tracks(&params, 1e-13, &mut StdRng::seed_from_u64(4)).is_err());
    }
}
