// file: src/data_handling/exporting.rs
// description: json and csv export of DDM matrices and analysis reports
// reference: merge-on-write of lag time rows for repeated runs over the same stack

use crate::error::{DdmError, Result};
use crate::models::{AnalysisReport, DdmMatrix};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: Option<PathBuf>,
}

/// Writes `<stem>_matrix.json` (and `<stem>_matrix.csv`) into `dir`, merging with
/// a previously exported matrix for the same source file.
pub fn export_data(
    dir: &Path,
    matrix: DdmMatrix,
    img_path: &Path,
    write_csv: bool,
) -> Result<(DdmMatrix, ExportPaths)> {
    fs::create_dir_all(dir).map_err(|source| DdmError::FileOperation {
        path: dir.to_path_buf(),
        source,
    })?;

    let hash = matrix.source_hash;
    let mut matrix = create_data_array(matrix.values, matrix.taus, img_path)?;
    matrix.source_hash = hash;
    let base = file_stem(img_path);
    let json_path = dir.join(format!("{}_matrix.json", base));
    let csv_path = dir.join(format!("{}_matrix.csv", base));

    if json_path.exists() {
        matrix = update_stored_data_array(&json_path, matrix)?;
    }

    write_json(&json_path, &matrix, true)?;
    let csv = if write_csv {
        write_matrix_csv(&csv_path, &matrix)?;
        Some(csv_path)
    } else {
        None
    };

    info!("Exported {} lag times to {}", matrix.taus.len(), json_path.display());
    Ok((matrix, ExportPaths { json: json_path, csv }))
}

/// Wraps raw matrix rows with the absolute source path.
pub fn create_data_array(values: Vec<Vec<f64>>, taus: Vec<usize>, img_path: &Path) -> Result<DdmMatrix> {
    let source = fs::canonicalize(img_path).unwrap_or_else(|_| img_path.to_path_buf());
    let mut matrix = DdmMatrix::new(taus, values)?;
    matrix.source_file = source.display().to_string();
    Ok(matrix)
}

/// Combines `matrix` with the one stored at `path`; rows of `matrix` win on equal lag times.
pub fn update_stored_data_array(path: &Path, matrix: DdmMatrix) -> Result<DdmMatrix> {
    let stored: DdmMatrix = read_json(path)?;

    if stored.source_file != matrix.source_file {
        return Err(DdmError::SourceMismatch {
            stored: stored.source_file,
            incoming: matrix.source_file,
        });
    }
    if stored.q_bins() != 0 && matrix.q_bins() != 0 && stored.q_bins() != matrix.q_bins() {
        return Err(DdmError::ShapeMismatch(format!(
            "stored matrix has {} q bins, new matrix has {}",
            stored.q_bins(),
            matrix.q_bins()
        )));
    }

    let mut rows: BTreeMap<usize, Vec<f64>> = stored.taus.into_iter().zip(stored.values).collect();
    rows.extend(matrix.taus.into_iter().zip(matrix.values));

    let (taus, values) = rows.into_iter().unzip();
    let mut combined = DdmMatrix::new(taus, values)?;
    combined.source_file = matrix.source_file;
    combined.source_hash = if matrix.source_hash.is_empty() {
        stored.source_hash
    } else {
        matrix.source_hash
    };
    combined.created_at = matrix.created_at;
    Ok(combined)
}

/// Writes an analysis report to `<stem>_analysis.json` in `dir`.
pub fn export_report(dir: &Path, report: &AnalysisReport, pretty: bool) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| DdmError::FileOperation {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}_analysis.json", file_stem(Path::new(&report.matrix.source_file))));
    write_json(&path, report, pretty)?;
    info!("Exported analysis of {} q bins to {}", report.fits.len(), path.display());
    Ok(path)
}

pub fn load_report(path: &Path) -> Result<AnalysisReport> {
    read_json(path)
}

pub fn write_matrix_csv(path: &Path, matrix: &DdmMatrix) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["tau".to_string()];
    header.extend((0..matrix.q_bins()).map(|q| q.to_string()));
    writer.write_record(&header)?;

    for (tau, row) in matrix.taus.iter().zip(&matrix.values) {
        let mut record = vec![tau.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let file = File::create(path).map_err(|source| DdmError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    let writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(writer, value)?;
    } else {
        serde_json::to_writer(writer, value)?;
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| DdmError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "stack".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn matrix(taus: Vec<usize>, values: Vec<Vec<f64>>) -> DdmMatrix {
        DdmMatrix::new(taus, values).unwrap()
    }

    #[test]
    fn test_export_writes_json_and_csv() {
        let temp = TempDir::new().unwrap();
        let img = temp.path().join("sample.tif");
        fs::write(&img, b"pixels").unwrap();
        let out = temp.path().join("results");

        let (matrix, paths) = export_data(&out, matrix(vec![1, 2], vec![vec![1.0, 2.0], vec![3.0, 4.0]]), &img, true).unwrap();

        assert_eq!(paths.json, out.join("sample_matrix.json"));
        assert!(paths.json.exists());
        let csv = fs::read_to_string(paths.csv.unwrap()).unwrap();
        assert_eq!(csv.lines().next().unwrap(), "tau,0,1");
        assert_eq!(csv.lines().nth(2).unwrap(), "2,3,4");
        assert_eq!(matrix.taus, vec![1, 2]);
    }

    #[test]
    fn test_export_merges_lag_times() {
        let temp = TempDir::new().unwrap();
        let img = temp.path().join("sample.tif");
        fs::write(&img, b"pixels").unwrap();

        export_data(temp.path(), matrix(vec![1, 3], vec![vec![1.0], vec![3.0]]), &img, false).unwrap();
        let mut update = matrix(vec![3, 2], vec![vec![9.0], vec![2.0]]);
        update.source_hash = "abc".to_string();
        let (merged, _) = export_data(temp.path(), update, &img, false).unwrap();

        assert_eq!(merged.taus, vec![1, 2, 3]);
        assert_eq!(merged.values, vec![vec![1.0], vec![2.0], vec![9.0]]);
        assert_eq!(merged.source_hash, "abc");
    }

    #[test]
    fn test_merge_rejects_other_source() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("a").join("sample.tif");
        let second = temp.path().join("b").join("sample.tif");
        fs::create_dir_all(first.parent().unwrap()).unwrap();
        fs::create_dir_all(second.parent().unwrap()).unwrap();
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"b").unwrap();

        let out = temp.path().join("out");
        export_data(&out, matrix(vec![1], vec![vec![1.0]]), &first, false).unwrap();
        let err = export_data(&out, matrix(vec![1], vec![vec![1.0]]), &second, false).unwrap_err();
        assert!(matches!(err, DdmError::SourceMismatch { .. }));
    }

    #[test]
    fn test_report_with_unestimated_errors_loads_back() {
        use crate::models::FitResult;

        let temp = TempDir::new().unwrap();
        let mut ddm = matrix(vec![1, 2], vec![vec![0.5, 1.0], vec![0.7, 1.2]]);
        ddm.source_file = temp.path().join("flat.tif").display().to_string();
        let report = AnalysisReport {
            matrix: ddm,
            a: vec![1.0, 2.0],
            b: 0.1,
            lag_times_ms: vec![10.0, 20.0],
            xscale: 0.1,
            tscale: 10.0,
            fits: vec![FitResult {
                model: "doubleExp".to_string(),
                q: 1,
                params: vec![10.0, 200.0, 0.5, 1.0, 1.0],
                errors: vec![f64::INFINITY; 5],
            }],
            failed_q: vec![0],
        };

        let path = export_report(temp.path(), &report, true).unwrap();
        assert_eq!(path, temp.path().join("flat_analysis.json"));

        let loaded = load_report(&path).unwrap();
        assert_eq!(loaded.fits, report.fits);
        assert_eq!(loaded.failed_q, vec![0]);
        assert!(loaded.fit_for(1).unwrap().errors.iter().all(|e| e.is_infinite()));
    }
}
