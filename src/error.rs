// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DdmError>;

#[derive(Error, Debug)]
pub enum DdmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{extension} is not a supported image format. The currently supported formats are {supported:?}")]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("No metadata reader is available for {extension}. The currently supported formats are {supported:?}")]
    NoMetadataReader {
        extension: String,
        supported: Vec<String>,
    },

    #[error("No pixel reader is available for {0} files; convert the series to TIFF first")]
    ProprietaryFormat(String),

    #[error("The file {0} does not exist")]
    FileNotFound(PathBuf),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Invalid lag time: {0}")]
    InvalidLagTime(String),

    #[error("Experiment {index} is out of bounds: index out of bounds for {count} experiment(s)")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("{name} is not a supported fitting function. The currently supported functions are {supported:?}")]
    UnsupportedFitFunction {
        name: String,
        supported: Vec<String>,
    },

    #[error(
        "The data fits well to a linear function, implying very little decorrelation which cannot be fitted to a model based on exponential decorrelation"
    )]
    LinearDecorrelation,

    #[error("Fit failed: {0}")]
    FitFailed(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stored data comes from {stored}, new data from {incoming}")]
    SourceMismatch { stored: String, incoming: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<serde_json::Error> for DdmError {
    fn from(err: serde_json::Error) -> Self {
        DdmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = DdmError::UnsupportedFormat {
            extension: ".abc".to_string(),
            supported: vec![".tif".to_string()],
        };
        assert!(err.to_string().contains("image format"));

        let err = DdmError::IndexOutOfBounds { index: 4, count: 3 };
        assert!(err.to_string().contains("index out of bounds"));

        assert!(
            DdmError::LinearDecorrelation
                .to_string()
                .contains("very little decorrelation")
        );
    }
}
