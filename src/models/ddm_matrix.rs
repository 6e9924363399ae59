// file: src/models/ddm_matrix.rs
// description: DDM matrix model, one radially averaged difference spectrum per lag time
// reference: internal data structures

use crate::error::{DdmError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdmMatrix {
    /// Lag times in frames
    pub taus: Vec<usize>,
    /// `values[tau_index][q]`
    pub values: Vec<Vec<f64>>,
    pub source_file: String,
    pub source_hash: String,
    pub created_at: String,
}

impl DdmMatrix {
    pub fn new(taus: Vec<usize>, values: Vec<Vec<f64>>) -> Result<Self> {
        if taus.len() != values.len() {
            return Err(DdmError::ShapeMismatch(format!(
                "{} lag times but {} matrix rows",
                taus.len(),
                values.len()
            )));
        }

        if let Some(first) = values.first()
            && values.iter().any(|row| row.len() != first.len())
        {
            return Err(DdmError::ShapeMismatch(
                "matrix rows have different numbers of q bins".to_string(),
            ));
        }

        Ok(Self {
            taus,
            values,
            source_file: String::new(),
            source_hash: String::new(),
            created_at: Utc::now().format("%m/%d/%Y, %H:%M:%S").to_string(),
        })
    }

    pub fn with_source(mut self, path: &Path, hash: String) -> Self {
        self.source_file = path.display().to_string();
        self.source_hash = hash;
        self
    }

    pub fn q_bins(&self) -> usize {
        self.values.first().map(Vec::len).unwrap_or(0)
    }

    pub fn row(&self, tau_index: usize) -> &[f64] {
        &self.values[tau_index]
    }

    pub fn column(&self, q: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[q]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_shape_checks() {
        assert!(DdmMatrix::new(vec![1, 2], vec![vec![0.0; 3]]).is_err());
        assert!(DdmMatrix::new(vec![1, 2], vec![vec![0.0; 3], vec![0.0; 2]]).is_err());

        let matrix = DdmMatrix::new(vec![1, 2], vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(matrix.q_bins(), 2);
        assert_eq!(matrix.row(1), &[3.0, 4.0]);
        assert_eq!(matrix.column(1), vec![2.0, 4.0]);
    }
}
