// file: src/simulation/mod.rs
// description: synthetic DDM image stacks from simulated particle motion
// reference: internal module structure

pub mod brownian;
pub mod render;

pub use brownian::{generate_tracks, get_diffusion_coefficient};
pub use render::{generate_frame, generate_images, simulate_gauss};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::models::{ImageStack, Tracks};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

/// Runs a full simulation: diffusion coefficient, tracks and rendered frames.
pub fn simulate(params: &SimulationConfig) -> Result<(Tracks, ImageStack)> {
    let diffusion = get_diffusion_coefficient(params.particle_size, params.viscosity, params.temperature);
    info!("Simulating {} particles with D = {:e} m^2/s", params.n_particles, diffusion);

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let tracks = generate_tracks(params, diffusion, &mut rng)?;
    let stack = generate_images(&tracks, params)?;
    Ok((tracks, stack))
}
