//! Machine learning building blocks: the classifier families, their shared contract and
//! evaluation metrics.
//!
//! Every family trains from a [`TrainDataset`] through [`ModelConfig::fit`] and is served through
//! the closed [`ClassifierModel`] enum.

pub mod forest;
pub mod gbdt;
pub mod metrics;
pub mod mlp;
mod model;

pub use model::{
    CancelToken, Classifier, ClassifierModel, Evaluation, ExampleOutcome, ModelConfig,
    ModelFamily, RankedLabel, TrainDataset, softmax,
};
pub(crate) use model::argmax;
