//! Error taxonomy for the inference pipeline.
//!
//! Only `ModelUnavailable` is terminal for a feature. Everything else is
//! scoped to one cycle, one detection or one user action. An empty
//! classifier is not an error at all: see `Prediction::Empty`.

use thiserror::Error;

use crate::classifier::ClassId;

#[derive(Debug, Error)]
pub enum LensError {
    /// Model load or warm-up failed. Not retried automatically.
    #[error("model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// A single inference call failed. The cycle is skipped, the loop continues.
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// Source or container dimensions are missing or degenerate.
    #[error("geometry unavailable: {0}")]
    GeometryUnavailable(&'static str),

    #[error("class {0} is not declared")]
    UnknownClass(ClassId),

    #[error("feature vector has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("no input source attached")]
    NoSource,

    #[error("source '{0}' is not ready to capture")]
    SourceNotReady(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

impl LensError {
    pub fn inference(err: anyhow::Error) -> Self {
        Self::InferenceFailure(format!("{:#}", err))
    }

    /// True for errors that end a feature rather than a single cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}
