// file: src/models/image_stack.rs
// description: in-memory microscopy image stack with spatial and temporal scales
// reference: internal data structures

use crate::error::{DdmError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A `(T, Y, X)` stack of grayscale frames stored row-major.
#[derive(Debug, Clone)]
pub struct ImageStack {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
    /// Microns per pixel
    pub xscale: f64,
    /// Milliseconds per frame
    pub tscale: f64,
    pub source: Option<PathBuf>,
}

impl ImageStack {
    pub fn new(frames: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != frames * height * width {
            return Err(DdmError::ShapeMismatch(format!(
                "expected {} pixels for {}x{}x{}, got {}",
                frames * height * width,
                frames,
                height,
                width,
                data.len()
            )));
        }

        Ok(Self {
            frames,
            height,
            width,
            data,
            xscale: 1.0,
            tscale: 1.0,
            source: None,
        })
    }

    pub fn from_frames(frames: Vec<Vec<f32>>, height: usize, width: usize) -> Result<Self> {
        let count = frames.len();
        let mut data = Vec::with_capacity(count * height * width);
        for (index, frame) in frames.into_iter().enumerate() {
            if frame.len() != height * width {
                return Err(DdmError::ShapeMismatch(format!(
                    "frame {} has {} pixels, expected {}",
                    index,
                    frame.len(),
                    height * width
                )));
            }
            data.extend(frame);
        }
        Self::new(count, height, width, data)
    }

    pub fn with_scales(mut self, xscale: f64, tscale: f64) -> Self {
        self.xscale = xscale;
        self.tscale = tscale;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn frame_len(&self) -> usize {
        self.height * self.width
    }

    pub fn frame(&self, index: usize) -> &[f32] {
        let len = self.frame_len();
        &self.data[index * len..(index + 1) * len]
    }

    pub fn frames_iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.frame_len().max(1))
    }

    pub fn t_coords(&self) -> Vec<f64> {
        (0..self.frames).map(|i| i as f64 * self.tscale).collect()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        (0..self.width).map(|i| i as f64 * self.xscale).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        (0..self.height).map(|i| i as f64 * self.xscale).collect()
    }
}

/// Scales and series information extracted from an image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub xscale: f64,
    pub tscale: f64,
    pub n_experiments: usize,
    pub experiment_names: Vec<String>,
    pub frames: usize,
    pub height: usize,
    pub width: usize,
}
