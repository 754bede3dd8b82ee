use thiserror::Error;

use crate::predictor::PredictionError;

/// Errors raised while configuring the encoder or building profile tensors.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Spectrum prediction failed: {0}")]
    UpstreamPrediction(#[from] PredictionError),
    #[error("Expected {expected} entries but found {found} ({context})")]
    ShapeMismatch {
        expected: usize,
        found: usize,
        context: String,
    },
    #[error("Spectrum {spectrum} has no populated bins, cannot infer a precursor range")]
    EmptyProfile { spectrum: usize },
    #[error("Log transform over a tensor with zero dynamic range (all values map to {value})")]
    DegenerateRange { value: f64 },
    #[error("Invalid peptide sequence: {0}")]
    InvalidSequence(String),
    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl ProfileError {
    pub(crate) fn shape_mismatch(expected: usize, found: usize, context: impl Into<String>) -> Self {
        ProfileError::ShapeMismatch {
            expected,
            found,
            context: context.into(),
        }
    }
}
