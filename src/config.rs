// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{DdmError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub data: DataConfig,
    pub processing: ProcessingConfig,
    pub fitting: FittingConfig,
    pub export: ExportConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Microns per pixel; read from file metadata when unset.
    pub xscale: Option<f64>,
    /// Milliseconds per frame; read from file metadata when unset.
    pub tscale: Option<f64>,
    /// Frames decoded per chunk, `-1` decodes the whole file at once. The full
    /// stack is held in memory either way.
    pub nframes: i64,
    pub experiment: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Auto,
    Sequential,
    Parallel,
    Gpu,
}

impl std::str::FromStr for Backend {
    type Err = DdmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "sequential" | "serial" => Ok(Backend::Sequential),
            "parallel" | "cpu" => Ok(Backend::Parallel),
            "gpu" => Ok(Backend::Gpu),
            other => Err(DdmError::Config(format!("unknown backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    pub backend: Backend,
    pub parallel_workers: usize,
    /// Largest lag time in frames; defaults to half the stack length.
    pub max_lag: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FittingConfig {
    pub model: String,
    /// Noise is averaged over radial bins `[len - noise_tail_start, len - noise_tail_end)`.
    pub noise_tail_start: usize,
    pub noise_tail_end: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub pretty: bool,
    pub write_csv: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub n_particles: usize,
    pub steps: usize,
    /// Seconds between steps.
    pub tau: f64,
    pub drift: (f64, f64),
    pub window: (usize, usize),
    /// Meters per pixel.
    pub pixel_size: f64,
    pub particle_size: f64,
    pub viscosity: f64,
    pub temperature: f64,
    pub amplitude: f64,
    pub sigma: f64,
    pub background_mean: f64,
    pub background_std: f64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_particles: 100,
            steps: 1000,
            tau: 0.01,
            drift: (0.1, 0.1),
            window: (512, 512),
            pixel_size: 1e-7,
            particle_size: 1e-6,
            viscosity: 1e-3,
            temperature: 293.0,
            amplitude: 1000.0,
            sigma: 2.0,
            background_mean: 200.0,
            background_std: 20.0,
            seed: None,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| DdmError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(
                config::File::from(Path::new("config/default.toml")).required(false),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("OPENDDM")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| DdmError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| DdmError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            data: DataConfig {
                xscale: None,
                tscale: None,
                nframes: 1,
                experiment: None,
            },
            processing: ProcessingConfig {
                backend: Backend::Auto,
                parallel_workers: 4,
                max_lag: None,
            },
            fitting: FittingConfig {
                model: "singleExp".to_string(),
                noise_tail_start: 100,
                noise_tail_end: 50,
                max_iterations: 500,
                tolerance: 1e-10,
            },
            export: ExportConfig {
                output_dir: PathBuf::from("./results"),
                pretty: true,
                write_csv: true,
            },
            simulation: SimulationConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.processing.parallel_workers == 0 {
            return Err(DdmError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        if self.data.nframes == 0 || self.data.nframes < -1 {
            return Err(DdmError::Config(
                "nframes must be greater than zero or -1".to_string(),
            ));
        }

        if self.fitting.noise_tail_start <= self.fitting.noise_tail_end {
            return Err(DdmError::Config(
                "noise_tail_start must be larger than noise_tail_end".to_string(),
            ));
        }

        if self.fitting.max_iterations == 0 {
            return Err(DdmError::Config(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        let sim = &self.simulation;
        for (name, value) in [
            ("tau", sim.tau),
            ("pixel_size", sim.pixel_size),
            ("particle_size", sim.particle_size),
            ("viscosity", sim.viscosity),
            ("temperature", sim.temperature),
            ("sigma", sim.sigma),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(DdmError::Config(format!(
                    "simulation.{} must be a positive number",
                    name
                )));
            }
        }

        if sim.window.0 == 0 || sim.window.1 == 0 {
            return Err(DdmError::Config(
                "simulation.window must be non-empty".to_string(),
            ));
        }

        Ok(())
    }
}
