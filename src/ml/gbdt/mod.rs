//! Deterministic gradient-boosted regression-tree classifier.
//!
//! Multi-class classification via softmax boosting: every stage fits one shallow tree per class
//! to the softmax residuals, searching splits over binned features.

mod model;
mod train;

pub use model::{GbdtModel, RegressionNode, RegressionTree};
pub use train::{TrainOptions, train_gbdt};
