// file: src/utils/validation.rs
// description: input validation for command line paths and analysis parameters
// reference: input validation patterns

use crate::data_handling::{SUPPORTED_FORMATS, extension_of};
use crate::error::{DdmError, Result};
use std::fs;
use std::path::Path;

pub struct Validator;

impl Validator {
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            DdmError::Validation(format!("Cannot canonicalize path {}: {}", path.display(), e))
        })?;

        if !canonical.is_file() {
            return Err(DdmError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(DdmError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(DdmError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Accepts any extension the loader recognises, including the ones it can only reject later.
    pub fn validate_image_extension(path: &Path) -> Result<()> {
        let extension = extension_of(path);
        if SUPPORTED_FORMATS.contains(&extension.as_str()) {
            Ok(())
        } else {
            Err(DdmError::UnsupportedFormat {
                extension,
                supported: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    pub fn is_tiff(path: &Path) -> bool {
        matches!(extension_of(path).as_str(), ".tif" | ".tiff")
    }

    pub fn validate_nframes(nframes: i64) -> Result<()> {
        if nframes == -1 || nframes > 0 {
            Ok(())
        } else {
            Err(DdmError::Validation(format!(
                "nframes must be greater than zero or -1, got {}",
                nframes
            )))
        }
    }

    pub fn validate_lag_times(max_lag: usize, frames: Option<usize>) -> Result<()> {
        if max_lag == 0 {
            return Err(DdmError::InvalidLagTime(
                "Cannot calculate 0 lag time, please start range at 1".to_string(),
            ));
        }
        if let Some(frames) = frames
            && max_lag >= frames
        {
            return Err(DdmError::InvalidLagTime(format!(
                "lag time {} is not smaller than the {} frames in the stack",
                max_lag, frames
            )));
        }
        Ok(())
    }

    pub fn validate_scale(name: &str, value: f64) -> Result<()> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(DdmError::Validation(format!(
                "{} must be a positive number, got {}",
                name, value
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_file_path() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("stack.tif");
        fs::write(&file_path, "test").unwrap();

        assert!(Validator::validate_file_path(&file_path).is_ok());
        assert!(Validator::validate_file_path(temp.path()).is_err());
        assert!(Validator::validate_file_path(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_validate_directory() {
        let temp = TempDir::new().unwrap();
        assert!(Validator::validate_directory(temp.path()).is_ok());
        assert!(Validator::validate_directory(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_validate_image_extension() {
        assert!(Validator::validate_image_extension(Path::new("a.tif")).is_ok());
        assert!(Validator::validate_image_extension(Path::new("a.TIFF")).is_ok());
        assert!(Validator::validate_image_extension(Path::new("a.nd2")).is_ok());
        let err = Validator::validate_image_extension(Path::new("a.png")).unwrap_err();
        assert!(err.to_string().contains("image format"));

        assert!(Validator::is_tiff(Path::new("a.tif")));
        assert!(!Validator::is_tiff(Path::new("a.lif")));
    }

    #[test]
    fn test_validate_nframes() {
        assert!(Validator::validate_nframes(-1).is_ok());
        assert!(Validator::validate_nframes(10).is_ok());
        assert!(Validator::validate_nframes(0).is_err());
        assert!(Validator::validate_nframes(-5).is_err());
    }

    #[test]
    fn test_validate_lag_times() {
        assert!(Validator::validate_lag_times(5, Some(10)).is_ok());
        assert!(Validator::validate_lag_times(5, None).is_ok());
        assert!(Validator::validate_lag_times(10, Some(10)).is_err());
        let err = Validator::validate_lag_times(0, None).unwrap_err();
        assert!(err.to_string().contains("start range at 1"));
    }

    #[test]
    fn test_validate_scale() {
        assert!(Validator::validate_scale("xscale", 0.1).is_ok());
        assert!(Validator::validate_scale("xscale", 0.0).is_err());
        assert!(Validator::validate_scale("tscale", f64::NAN).is_err());
    }
}
