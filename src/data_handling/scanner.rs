// file: src/data_handling/scanner.rs
// description: directory walking to find image stacks for batch analysis
// reference: https://docs.rs/walkdir

use crate::error::{DdmError, Result};
use crate::utils::Validator;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// TIFF stacks below `root`, sorted by path. Hidden files and directories are skipped.
pub fn scan_stacks(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(DdmError::Validation(format!(
            "Path is not a directory: {}",
            root.display()
        )));
    }

    info!("Scanning directory: {}", root.display());
    let mut stacks = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name().to_string_lossy().as_ref()))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if Validator::is_tiff(path) {
            stacks.push(path.to_path_buf());
        } else {
            debug!("Skipping file: {}", path.display());
        }
    }

    stacks.sort();
    info!("Found {} image stacks", stacks.len());
    Ok(stacks)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
