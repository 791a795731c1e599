//! Bagged CART classification forest.
//!
//! Each tree is grown on a bootstrap resample with a random feature subset drawn per split;
//! confidence for a class is the share of trees voting for it.

mod model;
mod train;

pub use model::{DecisionTree, RandomForestModel, TreeNode};
pub use train::{TrainOptions, train_forest};
