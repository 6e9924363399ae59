// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod data_handling;
pub mod error;
pub mod fitting;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod simulation;
pub mod utils;

pub use config::{Backend, Config, DataConfig, ExportConfig, FittingConfig, ProcessingConfig, SimulationConfig};
pub use data_handling::{export_data, read_file, read_metadata, save_stack, scan_stacks};
pub use error::{DdmError, Result};
pub use fitting::{FitModel, compute_ab, compute_isf, gen_fit};
pub use models::{AnalysisReport, DdmMatrix, FitResult, ImageMetadata, ImageStack, Tracks};
pub use pipeline::{AnalysisOutput, AnalysisPipeline, PipelineStats, ProgressTracker};
pub use processing::ddm;
pub use simulation::simulate;
pub use utils::{StageTimer, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        let _pipeline = AnalysisPipeline::new(config.clone());
        assert_eq!(config.fitting.model.parse::<FitModel>().unwrap(), FitModel::SingleExp);
    }
}
