// file: src/models/tracks.rs
// description: simulated particle trajectories
// reference: internal data structures

/// Particle positions in pixels with shape `(n_particles, 2, steps)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracks {
    pub n_particles: usize,
    pub steps: usize,
    data: Vec<f64>,
}

impl Tracks {
    pub fn zeros(n_particles: usize, steps: usize) -> Self {
        Self {
            n_particles,
            steps,
            data: vec![0.0; n_particles * 2 * steps],
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_particles, 2, self.steps)
    }

    fn offset(&self, particle: usize, axis: usize, step: usize) -> usize {
        (particle * 2 + axis) * self.steps + step
    }

    pub fn get(&self, particle: usize, axis: usize, step: usize) -> f64 {
        self.data[self.offset(particle, axis, step)]
    }

    pub fn set(&mut self, particle: usize, axis: usize, step: usize, value: f64) {
        let offset = self.offset(particle, axis, step);
        self.data[offset] = value;
    }

    /// `(x, y)` of every particle at one time point.
    pub fn positions_at(&self, step: usize) -> Vec<(f64, f64)> {
        (0..self.n_particles)
            .map(|p| (self.get(p, 0, step), self.get(p, 1, step)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexing() {
        let mut tracks = Tracks::zeros(2, 3);
        tracks.set(1, 1, 2, 5.0);
        tracks.set(0, 0, 1, -1.0);
        assert_eq!(tracks.shape(), (2, 2, 3));
        assert_eq!(tracks.get(1, 1, 2), 5.0);
        assert_eq!(tracks.positions_at(1), vec![(-1.0, 0.0), (0.0, 0.0)]);
    }
}
