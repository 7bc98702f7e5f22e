//! The single capability the gateway needs from a loaded artifact.

use serde::Serialize;
use thiserror::Error;

/// Batch in, batch out. Implementations are read-only after load and are
/// called concurrently from blocking worker threads.
pub trait Predictor: Send + Sync {
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Prediction, PredictError>;

    /// Expected feature vector width, when the artifact declares one.
    fn n_features(&self) -> Option<usize> { None }

    /// Short adapter name for logs.
    fn kind(&self) -> &'static str;
}

/// Model output as a plain JSON list, one entry per input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    /// `[y0, y1, ...]`
    Flat(Vec<f64>),
    /// `[[y00, y01], [y10, y11], ...]`
    Nested(Vec<Vec<f64>>),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictError {
    #[error("empty batch")]
    EmptyBatch,
    #[error("row {row} has {got} features, model expects {expected}")]
    FeatureCount { row: usize, expected: usize, got: usize },
    #[error("model backend failure: {0}")]
    Backend(String),
}

/// Rejects empty batches and rows whose width differs from `expected`.
pub fn check_widths(batch: &[Vec<f64>], expected: usize) -> Result<(), PredictError> {
    if batch.is_empty() { return Err(PredictError::EmptyBatch); }
    for (row, x) in batch.iter().enumerate() {
        if x.len() != expected { return Err(PredictError::FeatureCount { row, expected, got: x.len() }); }
    }
    Ok(())
}
