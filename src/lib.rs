//! Given-name prediction from demographic attributes.
//!
//! Raw labeled records are encoded into fixed-width feature vectors, split into train and test
//! partitions, and used to fit one of three classifier families. Trained models live in a
//! [`ModelRegistry`] and serve ranked name predictions through a [`PredictionAggregator`].

/// JSON boundary adapter for an HTTP layer.
pub mod api;
/// Application directory resolution.
pub mod app_dirs;
/// `config.toml` loading and saving.
pub mod config;
/// Record loading, preparation and statistics.
pub mod dataset;
/// Demographic attributes and labeled records.
pub mod demographic;
/// Crate error type.
pub mod error;
/// Demographic feature encoding.
pub mod features;
/// Tracing subscriber setup.
pub mod logging;
/// Classifier families, training and metrics.
pub mod ml;
/// Ranked predictions and metadata.
pub mod predict;
/// Model slots shared between training and inference.
pub mod registry;
/// Service handle combining registry, training and prediction.
pub mod service;
/// Training options and orchestration.
pub mod training;

pub use demographic::Demographic;
pub use error::{NamecastError, Result};
pub use predict::{PredictionAggregator, PredictionResult};
pub use registry::{ModelRegistry, SlotPolicy, TrainedModel};
pub use service::NameService;
pub use training::{ModelMetrics, ModelType, TrainingOptions, TrainingOrchestrator};
