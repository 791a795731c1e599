//! Labeled demographic datasets: loading, preparation and summary statistics.

pub mod loader;
mod prepare;
pub mod sample;
mod stats;
pub mod synthetic;

use std::path::PathBuf;

pub use prepare::{DatasetPreparer, LabeledVector, PreparedDataset, validate_split_ratio};
pub use stats::DatasetStats;

use crate::demographic::RawRecord;
use loader::DatasetLoadError;

/// Where training records come from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DatasetSource {
    /// The bundled sample corpus.
    #[default]
    BuiltIn,
    /// Seeded synthetic records.
    Synthetic { size: usize, seed: u64 },
    /// A JSON array or JSONL file of raw records.
    File(PathBuf),
}

impl DatasetSource {
    pub fn load(&self) -> Result<Vec<RawRecord>, DatasetLoadError> {
        match self {
            Self::BuiltIn => Ok(sample::raw_records()),
            Self::Synthetic { size, seed } => Ok(synthetic::raw_records(*size, *seed)),
            Self::File(path) => loader::load_records(path),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::BuiltIn => "built-in sample".to_string(),
            Self::Synthetic { size, seed } => format!("synthetic ({size} records, seed {seed})"),
            Self::File(path) => path.display().to_string(),
        }
    }
}
