//! Crate-level error type shared by training, inference and the boundary adapter.

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::loader::DatasetLoadError;

/// Errors surfaced by the training and inference engine.
#[derive(Debug, Error)]
pub enum NamecastError {
    /// Caller supplied an invalid option (unknown model type, bad split ratio, bad hyperparameter).
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No record survived validation, or the training partition is empty.
    #[error("No trainable data: {0}")]
    NoTrainableData(String),
    /// Inference was requested before any model slot was populated.
    #[error("No trained model available. Train a model first.")]
    NoTrainedModel,
    /// Feature vector width differs between the model and the codec.
    #[error("Feature vector length mismatch: model expects {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    /// Training stopped because its cancel token was raised.
    #[error("Training cancelled")]
    Cancelled,
    /// A model artifact failed structural validation.
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    /// Loading a dataset file failed.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetLoadError),
    /// Reading or writing a file failed.
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used when mapping errors onto protocol responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    NoTrainableData,
    NoTrainedModel,
    ShapeMismatch,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Stable identifier exposed to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::NoTrainableData => "no_trainable_data",
            Self::NoTrainedModel => "no_trained_model",
            Self::ShapeMismatch => "shape_mismatch",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl NamecastError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoTrainableData(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::NoTrainableData(_) => ErrorKind::NoTrainableData,
            Self::NoTrainedModel => ErrorKind::NoTrainedModel,
            Self::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidModel(_) | Self::Dataset(_) | Self::Io { .. } | Self::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Errors caused by the request itself rather than engine state.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::ShapeMismatch
        )
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = NamecastError> = std::result::Result<T, E>;
