// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod ddm_matrix;
pub mod fit;
pub mod image_stack;
pub mod tracks;

pub use ddm_matrix::DdmMatrix;
pub use fit::{AnalysisReport, FitResult};
pub use image_stack::{ImageMetadata, ImageStack};
pub use tracks::Tracks;
