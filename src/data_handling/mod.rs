// file: src/data_handling/mod.rs
// description: image loading, metadata and export module exports
// reference: internal module structure

pub mod exporting;
pub mod read_file;
pub mod read_metadata;
pub mod scanner;
pub mod tiff_writer;

pub use exporting::{
    ExportPaths, create_data_array, export_data, export_report, load_report, update_stored_data_array,
    write_matrix_csv,
};
pub use read_file::{hash_file, load_data, plan_chunks, read_file, select_experiment};
pub use read_metadata::read_metadata;
pub use scanner::scan_stacks;
pub use tiff_writer::save_stack;

use std::path::Path;

pub const SUPPORTED_FORMATS: [&str; 4] = [".lif", ".nd2", ".tif", ".tiff"];

/// Lower-cased extension including the leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
