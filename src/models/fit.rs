// file: src/models/fit.rs
// description: fit results and analysis reports
// reference: internal data structures

use crate::models::DdmMatrix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: String,
    pub q: usize,
    #[serde(with = "float_list")]
    pub params: Vec<f64>,
    /// Standard errors; infinite when the parameter covariance could not be estimated.
    #[serde(with = "float_list")]
    pub errors: Vec<f64>,
}

/// Everything produced by one run over an image stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub matrix: DdmMatrix,
    pub a: Vec<f64>,
    pub b: f64,
    /// Lag times in milliseconds
    pub lag_times_ms: Vec<f64>,
    pub xscale: f64,
    pub tscale: f64,
    pub fits: Vec<FitResult>,
    pub failed_q: Vec<usize>,
}

impl AnalysisReport {
    pub fn fit_for(&self, q: usize) -> Option<&FitResult> {
        self.fits.iter().find(|fit| fit.q == q)
    }
}

/// JSON has no inf/NaN, so non-finite values are written as the strings
/// `"inf"`, `"-inf"` and `"nan"` and read back from them.
mod float_list {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum JsonFloat {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|&v| {
                if v.is_finite() {
                    JsonFloat::Number(v)
                } else if v.is_nan() {
                    JsonFloat::Text("nan".to_string())
                } else if v > 0.0 {
                    JsonFloat::Text("inf".to_string())
                } else {
                    JsonFloat::Text("-inf".to_string())
                }
            })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<JsonFloat>::deserialize(deserializer)?
            .into_iter()
            .map(|v| match v {
                JsonFloat::Number(n) => Ok(n),
                JsonFloat::Text(text) => match text.to_ascii_lowercase().as_str() {
                    "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                    "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                    "nan" => Ok(f64::NAN),
                    other => Err(D::Error::custom(format!("invalid float value: {}", other))),
                },
            })
            .collect()
    }
}
