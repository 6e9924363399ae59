// file: src/processing/mod.rs
// description: processing module exports
// reference: internal module structure

pub mod ddm;
pub mod fft;
pub mod radial;

pub use ddm::{calc_matrix, calc_radial, ddm, ddm_with_progress, default_lag_times, resolve_lag_times};
pub use fft::{Fft2, fftshift};
pub use radial::{radial_profile, spectrum_centre};
